use std::cell::RefCell;

use crate::ident::QueryDefaults;

// Thread-local session defaults used to qualify partial relation names.
// Kept per thread so parallel tests and callers cannot flip each other's defaults.
thread_local! {
    static TLS_DEFAULTS: RefCell<QueryDefaults> = RefCell::new(QueryDefaults::from_options(None, None));
}

pub fn current_query_defaults() -> QueryDefaults { TLS_DEFAULTS.with(|d| d.borrow().clone()) }

pub fn set_current_database(db: &str) { TLS_DEFAULTS.with(|d| d.borrow_mut().current_database = db.to_string()); }

pub fn set_current_schema(schema: &str) { TLS_DEFAULTS.with(|d| d.borrow_mut().current_schema = schema.to_string()); }

pub fn set_query_defaults(defaults: QueryDefaults) { TLS_DEFAULTS.with(|d| *d.borrow_mut() = defaults); }
