use crate::config::{ConfigStore, ConfigValue};

use tempfile::TempDir;

/// **VALUE**: Verifies flushed values survive a reopen with their types.
///
/// **WHY THIS MATTERS**: Config clients read back what they wrote after a restart; a bool
/// coming back as an int would fail the typed getter.
///
/// **BUG THIS CATCHES**: Would catch the serde tag being dropped from `ConfigValue`.
#[test]
fn given_flushed_store_when_reopened_then_typed_values_back() {
    // GIVEN: A store with one value of each kind, flushed
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let mut store = ConfigStore::open(&path).unwrap();
    store.set("/ui/font", ConfigValue::String("Sans 10".to_string()));
    store.set("/ui/size", ConfigValue::Int(-4));
    store.set("/ui/show", ConfigValue::Bool(true));
    store.set("/ui/scale", ConfigValue::Double(1.25));
    store.set("/ise/order", ConfigValue::StringList(vec!["a".into(), "b".into()]));
    store.set("/ise/keys", ConfigValue::IntList(vec![1, 2]));
    store.flush().unwrap();

    // WHEN: Reopening
    let reopened = ConfigStore::open(&path).unwrap();

    // THEN: Every typed getter returns its value
    assert_eq!(reopened.get_string("/ui/font"), Some("Sans 10"));
    assert_eq!(reopened.get_int("/ui/size"), Some(-4));
    assert_eq!(reopened.get_bool("/ui/show"), Some(true));
    assert_eq!(reopened.get_double("/ui/scale"), Some(1.25));
    assert_eq!(reopened.get_string_list("/ise/order").unwrap(), ["a", "b"]);
    assert_eq!(reopened.get_int_list("/ise/keys").unwrap(), [1, 2]);
    assert!(!reopened.is_dirty());
}

/// **VALUE**: Verifies typed getters refuse values of another type.
///
/// **WHY THIS MATTERS**: `GetConfigInt` on a string key must fail, not return garbage.
///
/// **BUG THIS CATCHES**: Would catch lenient coercion between value kinds.
#[test]
fn given_string_value_when_read_as_int_then_none() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::open(dir.path().join("s.json")).unwrap();
    store.set("k", ConfigValue::String("5".to_string()));

    assert_eq!(store.get_int("k"), None);
    assert_eq!(store.get_string("k"), Some("5"));
}

/// **VALUE**: Verifies unchanged sets do not mark the store dirty.
///
/// **WHY THIS MATTERS**: Clients write their whole config on every focus change.
///
/// **BUG THIS CATCHES**: Would catch `set` always flagging a write.
#[test]
fn given_same_value_when_set_again_then_not_dirty() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::open(dir.path().join("s.json")).unwrap();
    store.set("k", ConfigValue::Bool(false));
    store.flush().unwrap();

    store.set("k", ConfigValue::Bool(false));

    assert!(!store.is_dirty());
}

/// **VALUE**: Verifies reload discards unflushed changes.
///
/// **WHY THIS MATTERS**: `ReloadConfig` is how a client abandons edits.
///
/// **BUG THIS CATCHES**: Would catch reload merging the file into memory.
#[test]
fn given_unflushed_change_when_reloaded_then_change_lost() {
    // GIVEN: A flushed value, then an erase that is not flushed
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::open(dir.path().join("s.json")).unwrap();
    store.set("keep", ConfigValue::Int(1));
    store.flush().unwrap();
    assert!(store.erase("keep"));
    assert!(store.is_dirty());

    // WHEN: Reloading
    store.reload().unwrap();

    // THEN: The erased key is back
    assert_eq!(store.get_int("keep"), Some(1));
    assert!(!store.is_dirty());
}

/// **VALUE**: Verifies erasing a missing key reports false and writes nothing.
///
/// **WHY THIS MATTERS**: `EraseConfig` replies `Fail` in that case.
///
/// **BUG THIS CATCHES**: Would catch a missing key counting as erased.
#[test]
fn given_missing_key_when_erased_then_false_and_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.json");
    let mut store = ConfigStore::open(&path).unwrap();

    assert!(!store.erase("nope"));
    store.flush().unwrap();

    assert!(!path.exists());
}
