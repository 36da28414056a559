//! The todo store's state value and its derived views.

use crate::models::{ItemsQuery, List, QueryResult, SortBy, Todo, User};
use crate::views::{self, TodoCounts};

/// Everything the todo store exposes, replaced as a whole on each change.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoState {
    pub current_user: Option<User>,

    pub lists: Vec<List>,
    /// Every item of the selected list, unfiltered.
    pub todos: Vec<Todo>,
    pub lists_loading: bool,
    pub todos_loading: bool,
    /// The item query whose result `todos` holds.
    pub todos_query: Option<ItemsQuery>,
    pub selected_list_id: Option<String>,
    pub list_search_term: String,

    pub new_list_text: String,
    pub is_adding_list: bool,
    pub is_editing_list: bool,
    pub is_deleting_list: bool,
    pub is_saving_list: bool,
    pub editing_list_text: String,

    pub is_sharing: bool,
    pub is_sharing_list: bool,
    pub share_email: String,
    pub unsharing_email: Option<String>,

    pub is_saving_todo: bool,
    pub new_todo_text: String,
    pub is_adding_todo: bool,
    pub just_added_todo_id: Option<String>,

    pub sort_by: SortBy,
    pub hide_completed: bool,
    pub search_term: String,

    pub editing_todo_id: Option<String>,
    pub editing_todo_text: String,

    pub confirming_delete_list_id: Option<String>,
    pub confirming_delete_todo_id: Option<String>,
    pub confirming_clear_completed: bool,
}

impl Default for TodoState {
    fn default() -> Self {
        Self {
            current_user: None,
            lists: Vec::new(),
            todos: Vec::new(),
            lists_loading: true,
            todos_loading: true,
            todos_query: None,
            selected_list_id: None,
            list_search_term: String::new(),
            new_list_text: String::new(),
            is_adding_list: false,
            is_editing_list: false,
            is_deleting_list: false,
            is_saving_list: false,
            editing_list_text: String::new(),
            is_sharing: false,
            is_sharing_list: false,
            share_email: String::new(),
            unsharing_email: None,
            is_saving_todo: false,
            new_todo_text: String::new(),
            is_adding_todo: false,
            just_added_todo_id: None,
            sort_by: SortBy::default(),
            hide_completed: false,
            search_term: String::new(),
            editing_todo_id: None,
            editing_todo_text: String::new(),
            confirming_delete_list_id: None,
            confirming_delete_todo_id: None,
            confirming_clear_completed: false,
        }
    }
}

/// Boolean flags raised for the duration of an async list or item action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyFlag {
    AddingList,
    SavingList,
    DeletingList,
    SharingList,
    AddingTodo,
    SavingTodo,
}

impl TodoState {
    pub(crate) fn set_busy(&mut self, flag: BusyFlag, busy: bool) {
        match flag {
            BusyFlag::AddingList => self.is_adding_list = busy,
            BusyFlag::SavingList => self.is_saving_list = busy,
            BusyFlag::DeletingList => self.is_deleting_list = busy,
            BusyFlag::SharingList => self.is_sharing_list = busy,
            BusyFlag::AddingTodo => self.is_adding_todo = busy,
            BusyFlag::SavingTodo => self.is_saving_todo = busy,
        }
    }

    /// The item query the current selection and sort call for.
    pub fn items_query(&self) -> ItemsQuery {
        ItemsQuery {
            list_id: self.selected_list_id.clone(),
            sort_by: self.sort_by,
        }
    }

    /// True once `todos` holds a settled result for the current selection and sort.
    pub fn todos_settled(&self) -> bool {
        !self.todos_loading && self.todos_query.as_ref() == Some(&self.items_query())
    }

    pub(crate) fn apply_lists(&mut self, result: QueryResult<List>) {
        self.lists = result.data;
        self.lists_loading = result.loading;
        self.reconcile_selection();
    }

    pub(crate) fn apply_todos(&mut self, query: ItemsQuery, result: QueryResult<Todo>) {
        self.todos = result.data;
        self.todos_loading = result.loading;
        self.todos_query = Some(query);
    }

    /// Keeps the selection pointing at an available list: the first one when
    /// nothing valid is selected, none when there are no lists.
    pub(crate) fn reconcile_selection(&mut self) {
        let still_available = self
            .selected_list_id
            .as_deref()
            .is_some_and(|id| self.lists.iter().any(|l| l.id == id));
        if !still_available {
            self.selected_list_id = self.lists.first().map(|l| l.id.clone());
        }
    }

    pub fn selected_list(&self) -> Option<&List> {
        views::find_list(&self.lists, self.selected_list_id.as_deref())
    }

    pub fn filtered_lists(&self) -> Vec<List> {
        views::filter_lists(&self.lists, &self.list_search_term)
    }

    /// The visible items: `todos` narrowed by search term and hide-completed.
    pub fn visible_todos(&self) -> Vec<Todo> {
        views::filter_todos(&self.todos, &self.search_term, self.hide_completed)
    }

    pub fn is_filtered(&self) -> bool {
        views::is_filtered(&self.search_term, self.hide_completed)
    }

    pub fn has_completed_todos(&self) -> bool {
        views::has_completed(&self.todos)
    }

    pub fn todo_counts(&self) -> TodoCounts {
        views::todo_counts(&self.todos)
    }

    pub fn find_todo(&self, todo_id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == todo_id)
    }
}
