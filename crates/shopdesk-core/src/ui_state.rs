//! Global UI state: status flags and the per-page parameter cache.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Parameters handed from one page to another (e.g. the id being edited).
pub type PageParams = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    /// Bootstrap (session restore) has finished.
    Init,
    Loading,
    ModalShow,
    DataNeedUpdate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub init: bool,
    pub loading: bool,
    pub modal_show: bool,
    pub data_need_update: bool,
}

impl StatusFlags {
    pub fn get(&self, flag: StatusFlag) -> bool {
        match flag {
            StatusFlag::Init => self.init,
            StatusFlag::Loading => self.loading,
            StatusFlag::ModalShow => self.modal_show,
            StatusFlag::DataNeedUpdate => self.data_need_update,
        }
    }

    fn slot(&mut self, flag: StatusFlag) -> &mut bool {
        match flag {
            StatusFlag::Init => &mut self.init,
            StatusFlag::Loading => &mut self.loading,
            StatusFlag::ModalShow => &mut self.modal_show,
            StatusFlag::DataNeedUpdate => &mut self.data_need_update,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiStore {
    flags: Arc<watch::Sender<StatusFlags>>,
    pages: Arc<Mutex<HashMap<String, PageParams>>>,
}

impl UiStore {
    pub fn new() -> Self {
        let (flags, _rx) = watch::channel(StatusFlags::default());
        Self {
            flags: Arc::new(flags),
            pages: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn pages(&self) -> MutexGuard<'_, HashMap<String, PageParams>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_flag(&self, flag: StatusFlag, value: bool) {
        self.flags.send_if_modified(|flags| {
            let slot = flags.slot(flag);
            let changed = *slot != value;
            *slot = value;
            changed
        });
    }

    pub fn flag(&self, flag: StatusFlag) -> bool {
        self.flags.borrow().get(flag)
    }

    pub fn flags(&self) -> StatusFlags {
        *self.flags.borrow()
    }

    pub fn subscribe_flags(&self) -> watch::Receiver<StatusFlags> {
        self.flags.subscribe()
    }

    pub fn set_page_params(&self, page: impl Into<String>, params: PageParams) {
        self.pages().insert(page.into(), params);
    }

    pub fn page_params(&self, page: &str) -> Option<PageParams> {
        self.pages().get(page).cloned()
    }

    pub fn delete_page_param(&self, page: &str) {
        self.pages().remove(page);
    }

    /// Merges `params` into `page`'s bag and drops every other page's bag,
    /// as one step.
    pub fn enter_page(&self, page: &str, params: Option<PageParams>) {
        let mut pages = self.pages();
        if let Some(params) = params {
            let bag = pages.entry(page.to_string()).or_default();
            bag.extend(params);
        }
        pages.retain(|name, _| name == page);
    }

    pub fn cached_pages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pages().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> PageParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flags_default_to_false() {
        let ui = UiStore::new();
        assert_eq!(ui.flags(), StatusFlags::default());
        assert!(!ui.flag(StatusFlag::Init));
    }

    #[test]
    fn test_set_flag() {
        let ui = UiStore::new();
        ui.set_flag(StatusFlag::Loading, true);
        assert!(ui.flag(StatusFlag::Loading));
        assert!(!ui.flag(StatusFlag::ModalShow));

        ui.set_flag(StatusFlag::Loading, false);
        assert!(!ui.flag(StatusFlag::Loading));
    }

    #[tokio::test]
    async fn test_flag_subscribers_only_wake_on_change() {
        let ui = UiStore::new();
        let mut rx = ui.subscribe_flags();

        ui.set_flag(StatusFlag::Init, false);
        assert!(!rx.has_changed().unwrap());

        ui.set_flag(StatusFlag::Init, true);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().init);
    }

    #[test]
    fn test_enter_page_merges_params() {
        let ui = UiStore::new();
        ui.enter_page("members", Some(params(json!({"id": 7}))));
        ui.enter_page("members", Some(params(json!({"tab": "phones"}))));

        assert_eq!(
            ui.page_params("members").unwrap(),
            params(json!({"id": 7, "tab": "phones"}))
        );
    }

    #[test]
    fn test_enter_page_purges_other_pages() {
        let ui = UiStore::new();
        ui.set_page_params("members", params(json!({"id": 7})));
        ui.set_page_params("games", params(json!({"name": "x"})));

        ui.enter_page("games", None);
        assert_eq!(ui.cached_pages(), vec!["games".to_string()]);
        assert!(ui.page_params("members").is_none());
    }

    #[test]
    fn test_delete_page_param() {
        let ui = UiStore::new();
        ui.set_page_params("stocks", params(json!({"id": 1})));
        ui.delete_page_param("stocks");
        ui.delete_page_param("stocks");
        assert!(ui.page_params("stocks").is_none());
    }
}
