//! Relational restore round trip against PostgreSQL.

use alexandria_db::test_fixtures::TestDatabase;
use alexandria_db::{
    Document, DocumentKind, DocumentRepository, FieldFilter, JournalEntry, JournalRepository,
    Link, LinkRepository, RestorePlan, RestoreRepository, Snapshot, Tag, TagColor, TagRepository,
};
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn sample_snapshot() -> Snapshot {
    let fiction = Tag {
        id: Uuid::now_v7(),
        display_name: "fiction".to_string(),
        color: TagColor::Green,
    };
    let rust = Tag {
        id: Uuid::now_v7(),
        display_name: "rust".to_string(),
        color: TagColor::Orange,
    };
    let created = now_millis();

    Snapshot {
        documents: vec![Document {
            id: Uuid::now_v7(),
            name: "dune.pdf".to_string(),
            display_name: "Dune".to_string(),
            path: "books/dune.pdf".to_string(),
            kind: DocumentKind::Book,
            description: "Desert planet".to_string(),
            created,
            updated: created,
            tags: vec![fiction.id],
        }],
        journal_entries: vec![JournalEntry {
            id: Uuid::now_v7(),
            content: "Started Dune".to_string(),
            created,
        }],
        links: vec![Link {
            id: Uuid::now_v7(),
            link: "https://www.rust-lang.org".to_string(),
            display_name: "Rust".to_string(),
            icon_path: String::new(),
            created,
            tags: vec![rust.id],
        }],
        tags: vec![fiction, rust],
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_restore_reproduces_entity_sets() {
    let db = TestDatabase::new().await;
    let snapshot = sample_snapshot();

    // Through the wire format, as a backup blob would travel.
    let decoded = Snapshot::from_slice(&snapshot.to_vec().unwrap()).unwrap();
    let (associations, dangling) = decoded.partition_associations();
    assert!(dangling.is_empty());

    db.relational
        .restore(&RestorePlan {
            snapshot: &decoded,
            associations,
        })
        .await
        .unwrap();

    let documents = db
        .relational
        .find_all_documents(&FieldFilter::new())
        .await
        .unwrap();
    let links = db.relational.find_all_links().await.unwrap();
    let entries = db.relational.find_all_entries().await.unwrap();
    let tags = db.relational.find_all_tags().await.unwrap();

    assert_eq!(documents, snapshot.documents);
    assert_eq!(links, snapshot.links);
    assert_eq!(entries, snapshot.journal_entries);
    assert_eq!(tags, snapshot.tags);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_restore_failure_rolls_back_everything() {
    let db = TestDatabase::new().await;
    let mut snapshot = sample_snapshot();
    // A repeated document id fails the third insert, after tags and journal
    // entries were already written inside the transaction.
    let duplicate = snapshot.documents[0].clone();
    snapshot.documents.push(duplicate);

    let plan = RestorePlan {
        associations: snapshot.partition_associations().0,
        snapshot: &snapshot,
    };
    assert!(db.relational.restore(&plan).await.is_err());

    assert!(db.relational.find_all_tags().await.unwrap().is_empty());
    assert!(db.relational.find_all_entries().await.unwrap().is_empty());
    assert!(db
        .relational
        .find_all_documents(&FieldFilter::new())
        .await
        .unwrap()
        .is_empty());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_restore_skips_dangling_associations() {
    let db = TestDatabase::new().await;
    let mut snapshot = sample_snapshot();
    let ghost = Uuid::now_v7();
    snapshot.documents[0].tags.push(ghost);

    let (associations, dangling) = snapshot.partition_associations();
    assert_eq!(dangling.len(), 1);

    db.relational
        .restore(&RestorePlan {
            snapshot: &snapshot,
            associations,
        })
        .await
        .unwrap();

    let doc = db
        .relational
        .find_document(snapshot.documents[0].id)
        .await
        .unwrap()
        .unwrap();
    assert!(!doc.tags.contains(&ghost));
    assert_eq!(doc.tags.len(), 1);

    db.cleanup().await;
}
