//! The two live-query pipelines that feed the store.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use super::Shared;
use crate::models::{QueryResult, User};
use crate::remote::LiveQuery;

fn idle<T: Send + 'static>() -> LiveQuery<T> {
    stream::pending().boxed()
}

/// Follows the signed-in user and keeps `lists` in step with their lists.
///
/// Every committed lists result also reconciles the selection, so the
/// items pipeline sees the new selection in the same state transition.
pub(super) async fn run_lists(shared: Arc<Shared>, mut user_rx: watch::Receiver<Option<User>>) {
    loop {
        let user = user_rx.borrow_and_update().clone();

        let mut results = match &user {
            Some(user) => {
                tracing::debug!(uid = %user.uid, "Subscribing to lists");
                let current = user.clone();
                shared.update(move |s| {
                    s.current_user = Some(current);
                    s.apply_lists(QueryResult::pending());
                });
                shared.lists.subscribe_lists(user)
            }
            None => {
                tracing::debug!("Signed out, clearing lists");
                shared.update(|s| {
                    s.current_user = None;
                    s.apply_lists(QueryResult::empty());
                });
                idle()
            }
        };

        loop {
            tokio::select! {
                biased;

                changed = user_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Identity provider closed, lists pipeline stopping");
                        return;
                    }
                    break;
                }
                next = results.next() => match next {
                    Some(result) => {
                        tracing::trace!(count = result.data.len(), loading = result.loading, "Lists result");
                        shared.update(move |s| s.apply_lists(result));
                    }
                    None => results = idle(),
                },
            }
        }
    }
}

/// Follows `(selected list, sort)` and keeps `todos` in step with that query.
pub(super) async fn run_items(shared: Arc<Shared>) {
    let mut state_rx = shared.state.subscribe();
    let mut query = state_rx.borrow_and_update().items_query();

    loop {
        let mut results = match &query.list_id {
            Some(list_id) => {
                tracing::debug!(list_id = %list_id, sort_by = %query.sort_by, "Subscribing to items");
                let pending = query.clone();
                shared.update(move |s| s.apply_todos(pending, QueryResult::pending()));
                shared
                    .items
                    .subscribe_items(list_id, query.sort_by, query.sort_by.direction())
            }
            None => {
                let empty = query.clone();
                shared.update(move |s| s.apply_todos(empty, QueryResult::empty()));
                idle()
            }
        };

        loop {
            tokio::select! {
                biased;

                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let next = state_rx.borrow_and_update().items_query();
                    if next != query {
                        query = next;
                        break;
                    }
                }
                next = results.next() => match next {
                    Some(result) => {
                        let current = query.clone();
                        // Only commit while the query is still the one the state asks for.
                        shared.state.send_if_modified(move |s| {
                            if s.items_query() != current {
                                return false;
                            }
                            s.apply_todos(current, result);
                            true
                        });
                    }
                    None => results = idle(),
                },
            }
        }
    }
}
