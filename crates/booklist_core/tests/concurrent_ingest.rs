use booklist_core::db::open_db;
use booklist_core::{
    BookRepository, IngestRequest, IngestService, ListService, Mention, RankingService,
    SqliteBookRepository, SqliteListRepository,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

const WORKERS: usize = 4;
const SHARED_BOOKS: usize = 20;
const OWN_BOOKS: usize = 5;

fn worker_request(worker: usize) -> IngestRequest {
    let mut mentions = Vec::new();
    for index in 0..SHARED_BOOKS {
        // Rotate the order so workers hit the shared ids at different times.
        let shared = (index + worker * 7) % SHARED_BOOKS;
        mentions.push(Mention {
            title: format!("Shared {shared} as seen by {worker}"),
            primary_external_id: Some(format!("shared-{shared}")),
            ..Mention::default()
        });
    }
    for index in 0..OWN_BOOKS {
        mentions.push(Mention {
            title: format!("Own {worker}-{index}"),
            secondary_external_id: Some(format!("978-0-{worker:02}-{index:04}")),
            ..Mention::default()
        });
    }
    IngestRequest {
        list_name: format!("curator-{worker}"),
        source_name: format!("curator {worker} picks"),
        mentions,
        ..IngestRequest::default()
    }
}

#[test]
fn concurrent_ingestion_creates_one_book_per_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("concurrent.db");
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = open_db(&path).unwrap();
                barrier.wait();
                IngestService::new(&mut conn)
                    .ingest(&worker_request(worker))
                    .unwrap()
            })
        })
        .collect();

    let reports: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let new_books: usize = reports.iter().map(|report| report.new_books).sum();
    assert_eq!(new_books, SHARED_BOOKS + WORKERS * OWN_BOOKS);
    for report in &reports {
        assert_eq!(report.attached(), SHARED_BOOKS + OWN_BOOKS);
        assert!(report.skipped.is_empty());
    }

    let mut conn = open_db(&path).unwrap();
    {
        let books = SqliteBookRepository::try_new(&conn).unwrap();
        assert_eq!(
            books.count_books().unwrap(),
            (SHARED_BOOKS + WORKERS * OWN_BOOKS) as i64
        );

        let lists = ListService::new(SqliteListRepository::try_new(&conn).unwrap());
        for report in &reports {
            let members = lists.members_of(report.list_id).unwrap();
            assert_eq!(members.len(), SHARED_BOOKS + OWN_BOOKS);
        }
    }

    let mut ranking = RankingService::new(&mut conn);
    let meta = ranking.create_meta_list("all curators", None).unwrap();
    for report in &reports {
        ranking.add_list(meta.id, report.list_id).unwrap();
    }
    let ranked = ranking.rank(meta.id).unwrap();
    assert_eq!(ranked.len(), SHARED_BOOKS + WORKERS * OWN_BOOKS);

    let top: HashSet<String> = ranked[..SHARED_BOOKS]
        .iter()
        .map(|entry| entry.book.source_id.clone().unwrap())
        .collect();
    assert_eq!(top.len(), SHARED_BOOKS);
    assert!(ranked[..SHARED_BOOKS]
        .iter()
        .all(|entry| entry.frequency == WORKERS as u32));
    assert!(ranked[SHARED_BOOKS..]
        .iter()
        .all(|entry| entry.frequency == 1));
}
