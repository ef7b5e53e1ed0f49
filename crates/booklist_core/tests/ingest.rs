use booklist_core::db::open_db_in_memory;
use booklist_core::{
    IngestRequest, IngestService, ListRepository, Mention, MentionError, ServiceError,
    SkipReason, SqliteListRepository,
};
use rusqlite::Connection;

fn mention(title: &str, primary: Option<&str>) -> Mention {
    Mention {
        title: title.to_string(),
        primary_external_id: primary.map(str::to_string),
        ..Mention::default()
    }
}

fn request(list_name: &str, mentions: Vec<Mention>) -> IngestRequest {
    IngestRequest {
        list_name: list_name.to_string(),
        list_description: None,
        source_name: format!("{list_name} snapshot"),
        source_url: Some("https://book.example/top".to_string()),
        mentions,
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn ingest_attaches_every_mention_with_positional_rank() {
    let mut conn = open_db_in_memory().unwrap();
    let report = IngestService::new(&mut conn)
        .ingest(&request(
            "douban",
            vec![
                mention("红楼梦", Some("1007305")),
                mention("活着", Some("4913064")),
                mention("百年孤独", Some("6082808")),
            ],
        ))
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.new_books, 3);
    assert_eq!(report.existing_books, 0);
    assert_eq!(report.attached(), 3);
    assert!(report.skipped.is_empty());

    let lists = SqliteListRepository::try_new(&conn).unwrap();
    let items = lists.items_of(report.raw_list_id).unwrap();
    let ranks: Vec<i64> = items.iter().map(|item| item.source_rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    let raw_list = lists.get_raw_list(report.raw_list_id).unwrap().unwrap();
    assert_eq!(raw_list.list_id, Some(report.list_id));
    assert_eq!(raw_list.name, "douban snapshot");
}

#[test]
fn explicit_ranks_are_kept_and_gaps_allowed() {
    let mut conn = open_db_in_memory().unwrap();
    let mut first = mention("A", Some("a"));
    first.source_rank = Some(10);
    let mut second = mention("B", Some("b"));
    second.source_rank = Some(4);

    let report = IngestService::new(&mut conn)
        .ingest(&request("chart", vec![first, second]))
        .unwrap();

    let lists = SqliteListRepository::try_new(&conn).unwrap();
    let ranks: Vec<i64> = lists
        .items_of(report.raw_list_id)
        .unwrap()
        .iter()
        .map(|item| item.source_rank)
        .collect();
    assert_eq!(ranks, vec![4, 10]);
}

#[test]
fn duplicate_rank_is_skipped_and_reported() {
    let mut conn = open_db_in_memory().unwrap();
    let mut explicit = mention("A", Some("a"));
    explicit.source_rank = Some(2);

    let report = IngestService::new(&mut conn)
        .ingest(&request("chart", vec![explicit, mention("B", Some("b"))]))
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.attached(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].position, 2);
    assert_eq!(report.skipped[0].reason, SkipReason::DuplicateRank { rank: 2 });
    assert_eq!(count(&conn, "books"), 1);
}

#[test]
fn invalid_mentions_are_skipped_not_fatal() {
    let mut conn = open_db_in_memory().unwrap();
    let mut zero_rank = mention("Z", None);
    zero_rank.source_rank = Some(0);

    let report = IngestService::new(&mut conn)
        .ingest(&request(
            "mixed",
            vec![
                mention("Good", None),
                mention("   ", None),
                zero_rank,
                mention("Also good", None),
            ],
        ))
        .unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.new_books, 2);
    assert_eq!(report.attached(), 2);
    let skipped: Vec<(usize, SkipReason)> = report
        .skipped
        .iter()
        .map(|skip| (skip.position, skip.reason.clone()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (
                2,
                SkipReason::InvalidMention {
                    error: MentionError::Unidentifiable
                }
            ),
            (
                3,
                SkipReason::InvalidMention {
                    error: MentionError::InvalidRank(0)
                }
            ),
        ]
    );
    assert_eq!(count(&conn, "raw_list_items"), 2);
}

#[test]
fn empty_ingest_creates_list_and_empty_raw_list() {
    let mut conn = open_db_in_memory().unwrap();
    let report = IngestService::new(&mut conn)
        .ingest(&request("brand new", Vec::new()))
        .unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.attached(), 0);
    assert!(report.skipped.is_empty());
    assert_eq!(count(&conn, "lists"), 1);
    assert_eq!(count(&conn, "raw_lists"), 1);
    assert_eq!(count(&conn, "raw_list_items"), 0);
}

#[test]
fn reingesting_same_list_name_reuses_list() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);

    let mut first_request = request("gates", vec![mention("Factfulness", Some("f-1"))]);
    first_request.list_description = Some("annual picks".to_string());
    let first = service.ingest(&first_request).unwrap();

    let mut second_request = request(
        "gates",
        vec![
            mention("Factfulness (2nd print)", Some("f-1")),
            mention("The Code Breaker", Some("c-1")),
        ],
    );
    second_request.list_description = Some("ignored".to_string());
    let second = service.ingest(&second_request).unwrap();

    assert_eq!(first.list_id, second.list_id);
    assert_ne!(first.raw_list_id, second.raw_list_id);
    assert_eq!(second.new_books, 1);
    assert_eq!(second.existing_books, 1);
    drop(service);

    let lists = SqliteListRepository::try_new(&conn).unwrap();
    let list = lists.get_list(first.list_id).unwrap().unwrap();
    assert_eq!(list.description.as_deref(), Some("annual picks"));
    assert_eq!(lists.raw_lists_of(list.id).unwrap().len(), 2);
    assert_eq!(count(&conn, "lists"), 1);
}

#[test]
fn blank_list_name_is_rejected_before_writing() {
    let mut conn = open_db_in_memory().unwrap();
    let err = IngestService::new(&mut conn)
        .ingest(&request("  ", vec![mention("A", None)]))
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidName("list name")));
    assert_eq!(count(&conn, "lists"), 0);
    assert_eq!(count(&conn, "books"), 0);
}

#[test]
fn storage_failure_rolls_back_the_whole_run() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_third_item
         BEFORE INSERT ON raw_list_items
         WHEN NEW.source_rank = 3
         BEGIN
            SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let err = IngestService::new(&mut conn)
        .ingest(&request(
            "fragile",
            vec![mention("A", None), mention("B", None), mention("C", None)],
        ))
        .unwrap_err();

    assert!(matches!(err, ServiceError::Persistence(_)));
    assert_eq!(count(&conn, "lists"), 0);
    assert_eq!(count(&conn, "raw_lists"), 0);
    assert_eq!(count(&conn, "raw_list_items"), 0);
    assert_eq!(count(&conn, "books"), 0);
}

#[test]
fn resolve_mention_reports_created_then_matched() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);

    let created = service.resolve_mention(&mention("Solaris", Some("s-1"))).unwrap();
    let matched = service.resolve_mention(&mention("Солярис", Some("s-1"))).unwrap();
    assert!(created.is_created());
    assert!(!matched.is_created());
    assert_eq!(created.book.id, matched.book.id);

    let err = service.resolve_mention(&mention("", None)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidMention(MentionError::Unidentifiable)
    ));
}

#[test]
fn report_serializes_skip_reasons() {
    let mut conn = open_db_in_memory().unwrap();
    let report = IngestService::new(&mut conn)
        .ingest(&request("json", vec![mention("", None)]))
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["total"], 1);
    assert_eq!(value["skipped"][0]["position"], 1);
    assert_eq!(value["skipped"][0]["reason"]["kind"], "invalid_mention");
    assert_eq!(
        value["skipped"][0]["reason"]["error"]["kind"],
        "unidentifiable"
    );
}
