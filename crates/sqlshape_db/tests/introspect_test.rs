use std::fs;
use std::path::Path;

use sqlshape_db::{
    FieldDescriptor, FieldSource, MetadataConfig, MetadataHelper, ObjectName, ResultSet,
    ResultSetCache, SqlType,
};
use sqlshape_test_utils::{capture_logs, DescribedColumn, ScriptedSession};
use tempfile::TempDir;
use tracing::Level;

const GET_USERS: &str = "[dbo].[GetUsers]";

fn get_users() -> ObjectName {
    ObjectName::new("dbo", "GetUsers")
}

fn user_columns() -> Vec<DescribedColumn> {
    vec![
        DescribedColumn::new("Id", "int", false),
        DescribedColumn::new("Email", "nvarchar(256)", true),
    ]
}

fn user_fields() -> ResultSet {
    ResultSet::new(vec![
        FieldDescriptor::new("Id", false, SqlType::Int),
        FieldDescriptor::new("Email", true, SqlType::NVarChar),
    ])
}

fn cached_helper(session: ScriptedSession, root: &Path) -> MetadataHelper<ScriptedSession> {
    MetadataHelper::new(session, MetadataConfig::with_cache(root)).unwrap()
}

fn cache_file(root: &Path) -> std::path::PathBuf {
    root.join("ResultSets").join("dbo.GetUsers.json")
}

#[test]
fn test_live_result_is_returned_and_cached() {
    let tmp = TempDir::new().unwrap();
    let helper = cached_helper(
        ScriptedSession::new().with_result_set(GET_USERS, user_columns()),
        tmp.path(),
    );

    let lookup = helper.describe_result_set(&get_users(), None, true);

    assert_eq!(lookup.fields, user_fields());
    assert_eq!(lookup.source, FieldSource::Live);
    assert!(!lookup.is_stale());

    let on_disk: ResultSet =
        serde_json::from_str(&fs::read_to_string(cache_file(tmp.path())).unwrap()).unwrap();
    assert_eq!(on_disk, user_fields());
}

#[test]
fn test_unreachable_database_replays_cache() {
    let tmp = TempDir::new().unwrap();
    let session = ScriptedSession::new().with_result_set(GET_USERS, user_columns());
    let helper = cached_helper(session, tmp.path());
    helper.get_result_set_fields(&get_users(), None, true);

    helper.session().go_offline("A network-related error occurred");
    helper.cache().unwrap().invalidate_all();
    let (lookup, logs) = capture_logs(|| helper.describe_result_set(&get_users(), None, true));

    assert_eq!(lookup.fields, user_fields());
    assert_eq!(lookup.source, FieldSource::Cache);
    assert!(lookup.is_stale());
    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(logs.count(Level::WARN), 0);
    let error = &logs.at_level(Level::ERROR)[0];
    assert_eq!(error.field("object"), Some("dbo.GetUsers"));
    assert!(error.field("error").unwrap().contains("network-related"));
}

#[test]
fn test_live_result_wins_over_stale_cache() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultSetCache::new(tmp.path().join("ResultSets"), false);
    let stale = ResultSet::new(vec![FieldDescriptor::new("Legacy", true, SqlType::VarChar)]);
    cache.save(&get_users(), &stale).unwrap();

    let helper = cached_helper(
        ScriptedSession::new().with_result_set(GET_USERS, user_columns()),
        tmp.path(),
    );
    let fields = helper.get_result_set_fields(&get_users(), None, true);

    assert_eq!(fields, user_fields());
    assert_eq!(cache.load(&get_users()).unwrap(), user_fields());
}

#[test]
fn test_empty_live_result_falls_back_to_cache() {
    let tmp = TempDir::new().unwrap();
    ResultSetCache::new(tmp.path().join("ResultSets"), false)
        .save(&get_users(), &user_fields())
        .unwrap();
    let helper = cached_helper(
        ScriptedSession::new().with_result_set(GET_USERS, Vec::new()),
        tmp.path(),
    );

    let (lookup, logs) = capture_logs(|| helper.describe_result_set(&get_users(), None, true));

    assert_eq!(lookup.fields, user_fields());
    assert_eq!(lookup.source, FieldSource::Cache);
    assert_eq!(logs.count(Level::ERROR), 0);
    assert_eq!(logs.count(Level::WARN), 0);
}

#[test]
fn test_empty_live_result_is_final_when_configured() {
    let tmp = TempDir::new().unwrap();
    ResultSetCache::new(tmp.path().join("ResultSets"), false)
        .save(&get_users(), &user_fields())
        .unwrap();
    let config = MetadataConfig {
        treat_empty_as_failure: false,
        ..MetadataConfig::with_cache(tmp.path())
    };
    let helper = MetadataHelper::new(
        ScriptedSession::new().with_result_set(GET_USERS, Vec::new()),
        config,
    )
    .unwrap();

    let lookup = helper.describe_result_set(&get_users(), None, true);

    assert!(lookup.fields.is_empty());
    assert_eq!(lookup.source, FieldSource::Unavailable);
    let cached = ResultSetCache::new(tmp.path().join("ResultSets"), false)
        .load(&get_users())
        .unwrap();
    assert_eq!(cached, user_fields(), "empty live result must not overwrite the cache");
}

#[test]
fn test_failure_without_cache_entry_returns_empty() {
    let tmp = TempDir::new().unwrap();
    let session = ScriptedSession::new();
    session.go_offline("login timeout");
    let helper = cached_helper(session, tmp.path());

    let (lookup, logs) = capture_logs(|| helper.describe_result_set(&get_users(), None, true));

    assert!(lookup.fields.is_empty());
    assert_eq!(lookup.source, FieldSource::Unavailable);
    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(logs.count(Level::WARN), 0, "a missing cache file is not a warning");
}

#[test]
fn test_caching_disabled_skips_cache_entirely() {
    let tmp = TempDir::new().unwrap();
    ResultSetCache::new(tmp.path().join("ResultSets"), false)
        .save(&get_users(), &user_fields())
        .unwrap();
    let session = ScriptedSession::new();
    session.go_offline("login timeout");
    let helper = cached_helper(session, tmp.path());

    let fields = helper.get_result_set_fields(&get_users(), None, false);

    assert!(fields.is_empty());
}

#[test]
fn test_caching_disabled_does_not_write() {
    let tmp = TempDir::new().unwrap();
    let helper = cached_helper(
        ScriptedSession::new().with_result_set(GET_USERS, user_columns()),
        tmp.path(),
    );

    let fields = helper.get_result_set_fields(&get_users(), None, false);

    assert_eq!(fields, user_fields());
    assert!(!tmp.path().join("ResultSets").exists());
}

#[test]
fn test_failed_cache_write_keeps_live_result() {
    let tmp = TempDir::new().unwrap();
    // A plain file where the cache directory should be makes every save fail.
    fs::write(tmp.path().join("ResultSets"), "not a directory").unwrap();
    let helper = cached_helper(
        ScriptedSession::new().with_result_set(GET_USERS, user_columns()),
        tmp.path(),
    );

    let (lookup, logs) = capture_logs(|| helper.describe_result_set(&get_users(), None, true));

    assert_eq!(lookup.fields, user_fields());
    assert_eq!(lookup.source, FieldSource::Live);
    let warnings = logs.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Could not cache result set");
    assert_eq!(warnings[0].field("kind"), Some("cache_write"));
    assert_eq!(logs.count(Level::ERROR), 0);
}

#[test]
fn test_corrupt_cache_entry_is_a_warning() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("ResultSets")).unwrap();
    fs::write(cache_file(tmp.path()), "[{\"name\": \"Id\"").unwrap();
    let session = ScriptedSession::new();
    session.go_offline("login timeout");
    let helper = cached_helper(session, tmp.path());

    let (fields, logs) = capture_logs(|| helper.get_result_set_fields(&get_users(), None, true));

    assert!(fields.is_empty());
    assert_eq!(logs.count(Level::ERROR), 1);
    let warnings = logs.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Could not get cached result set");
    assert_eq!(warnings[0].field("kind"), Some("parse"));
}

#[test]
fn test_explicit_tsql_is_described() {
    let tsql = "EXEC dbo.GetUsers @Active = 1";
    let session = ScriptedSession::new().with_result_set(tsql, user_columns());
    let helper = MetadataHelper::new(session, MetadataConfig::default()).unwrap();

    let fields = helper.get_result_set_fields(&get_users(), Some(tsql), false);

    assert_eq!(fields, user_fields());
    let calls = helper.session().calls();
    assert_eq!(calls[0].params, vec![sqlshape_db::DbValue::from(tsql)]);
}

#[test]
fn test_unnamed_columns_get_ordinal_names() {
    let session = ScriptedSession::new().with_result_set(
        GET_USERS,
        vec![
            DescribedColumn::new("Id", "int", false),
            DescribedColumn::unnamed("bigint", true),
        ],
    );
    let helper = MetadataHelper::new(session, MetadataConfig::default()).unwrap();

    let fields = helper.get_result_set_fields(&get_users(), None, false);

    assert_eq!(fields.fields()[1].name, "Column2");
    assert_eq!(fields.fields()[1].db_type, SqlType::BigInt);
}

#[test]
fn test_repeated_column_names_are_kept_and_cached() {
    let tmp = TempDir::new().unwrap();
    let session = ScriptedSession::new().with_result_set(
        GET_USERS,
        vec![
            DescribedColumn::new("Id", "int", false),
            DescribedColumn::new("ID", "int", false),
            DescribedColumn::new("Total", "money", true),
        ],
    );
    let helper = cached_helper(session, tmp.path());
    let expected = ResultSet::new(vec![
        FieldDescriptor::new("Id", false, SqlType::Int),
        FieldDescriptor::new("ID", false, SqlType::Int),
        FieldDescriptor::new("Total", true, SqlType::Money),
    ]);

    let (lookup, logs) = capture_logs(|| helper.describe_result_set(&get_users(), None, true));

    assert_eq!(lookup.source, FieldSource::Live);
    assert_eq!(lookup.fields, expected);
    assert_eq!(logs.count(Level::ERROR), 0);
    let warnings = logs.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("column"), Some("ID"));
    assert!(cache_file(tmp.path()).is_file());

    helper.session().go_offline("A network-related error occurred");
    helper.cache().unwrap().invalidate_all();
    let replayed = helper.describe_result_set(&get_users(), None, true);
    assert_eq!(replayed.source, FieldSource::Cache);
    assert_eq!(replayed.fields, expected);
}

#[test]
fn test_query_errors_are_recovered() {
    let tmp = TempDir::new().unwrap();
    let session = ScriptedSession::new().with_result_set(GET_USERS, user_columns());
    let helper = cached_helper(session, tmp.path());
    helper.get_result_set_fields(&get_users(), None, true);

    helper
        .session()
        .fail_result_set(GET_USERS, "Invalid object name 'dbo.Users'.");
    let (fields, logs) = capture_logs(|| helper.get_result_set_fields(&get_users(), None, true));

    assert_eq!(fields, user_fields());
    assert_eq!(logs.count(Level::ERROR), 1);
}
