use mason_sdk::{
    Db, DeleteMode, Error, Field, Operator, Predicate, Record, RecordState, Schema, SchemaRegistry, Scope,
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn setup(mode: DeleteMode) -> (Db, Arc<Schema>) {
    let mut db = Db::connect("sqlite::memory:").await.unwrap().with_delete_mode(mode);
    let mut registry = SchemaRegistry::new();
    let users = registry
        .register(
            Schema::builder("users")
                .field("login", Field::login(64))
                .field("role", Field::id().default(1))
                .field("note", Field::char(16).nullable())
                .field("login_hash", Field::random_hash(32)),
        )
        .unwrap();
    users.create_table(&mut db).await.unwrap();
    (db, users)
}

async fn create(db: &mut Db, users: &Arc<Schema>, login: &str) -> Record {
    let mut r = Record::new(users);
    r.set("login", login).unwrap();
    r.save(db).await.unwrap();
    r
}

#[tokio::test]
async fn insert_then_find_round_trips() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    let mut r = Record::new(&users);
    r.set("login", "bob_1").unwrap();
    r.set("role", "3").unwrap();
    r.save(&mut db).await.unwrap();
    let id = r.id().unwrap();
    assert!(id > 0);

    let found = Record::find(&mut db, &users, id).await.unwrap();
    assert_eq!(found.get("login").unwrap(), json!("bob_1"));
    assert_eq!(found.get("role").unwrap(), json!(3));
    assert_eq!(found.get("note").unwrap(), Value::Null);
    assert_eq!(found.get("login_hash").unwrap(), r.get("login_hash").unwrap());
    assert_eq!(found.get("created_at_timestamp").unwrap(), r.get("created_at_timestamp").unwrap());
    assert_eq!(found.state(), RecordState::Persisted);
}

#[tokio::test]
async fn find_missing_is_not_found() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    let err = Record::find(&mut db, &users, 42).await.unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));
}

#[tokio::test]
async fn update_persists_only_assigned_fields() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    let mut r = create(&mut db, &users, "amy").await;
    r.set("note", "hello").unwrap();
    assert!(r.is_dirty());
    r.save(&mut db).await.unwrap();
    assert!(!r.is_dirty());

    let found = Record::find(&mut db, &users, r.id().unwrap()).await.unwrap();
    assert_eq!(found.get("note").unwrap(), json!("hello"));
    assert_eq!(found.get("login").unwrap(), json!("amy"));
}

#[tokio::test]
async fn soft_deleted_rows_leave_default_reads() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    let mut gone = create(&mut db, &users, "gone").await;
    create(&mut db, &users, "kept").await;
    gone.delete(&mut db).await.unwrap();
    assert_eq!(gone.state(), RecordState::SoftDeleted);

    let id = gone.id().unwrap();
    assert!(matches!(
        Record::find(&mut db, &users, id).await,
        Err(Error::RecordNotFound(_))
    ));

    let active = Record::select(&mut db, &users, None, Scope::Active).await.unwrap();
    assert_eq!(active.column("login").unwrap(), vec![json!("kept")]);

    let deleted = Record::select(&mut db, &users, None, Scope::Deleted).await.unwrap();
    assert_eq!(deleted.first().unwrap().id(), Some(id));

    let explicit = Predicate::and().set("deleted_at", Operator::IsNot, Value::Null);
    let all = Record::select(&mut db, &users, Some(explicit), Scope::All).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.first().unwrap().get("login").unwrap(), json!("gone"));
}

#[tokio::test]
async fn hard_delete_removes_the_row() {
    let (mut db, users) = setup(DeleteMode::Hard).await;
    let mut r = create(&mut db, &users, "tmp").await;
    r.delete(&mut db).await.unwrap();
    assert_eq!(r.state(), RecordState::HardDeleted);
    let all = Record::select(&mut db, &users, None, Scope::All).await.unwrap();
    assert!(all.is_empty());
    assert!(matches!(r.save(&mut db).await, Err(Error::RecordRemoved(_))));
}

#[tokio::test]
async fn select_filters_and_serializes() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    for login in ["ann", "ben", "cid"] {
        create(&mut db, &users, login).await;
    }
    let pred = Predicate::or()
        .set("login", Operator::Eq, "ann")
        .set("login", Operator::Like, "c%");
    let set = Record::select(&mut db, &users, Some(pred), Scope::Active).await.unwrap();
    assert_eq!(set.map(|r| r.get_as::<String>("login").unwrap()), vec!["ann", "cid"]);

    let json = set.to_json();
    assert_eq!(json[0]["login"], json!("ann"));
    assert_eq!(json[1]["role"], json!(1));
    assert_eq!(serde_json::to_value(&set).unwrap(), json);
}

#[tokio::test]
async fn dropped_transaction_discards_writes() {
    let (mut db, users) = setup(DeleteMode::Soft).await;
    {
        let mut tx = db.begin().await.unwrap();
        create(&mut tx, &users, "ghost").await;
    }
    let all = Record::select(&mut db, &users, None, Scope::All).await.unwrap();
    assert!(all.is_empty());

    let mut tx = db.begin().await.unwrap();
    create(&mut tx, &users, "real").await;
    tx.commit().await.unwrap();
    let all = Record::select(&mut db, &users, None, Scope::All).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn stored_null_survives_a_nullable_default() {
    let mut db = Db::connect("sqlite::memory:").await.unwrap();
    let notes = Arc::new(
        Schema::builder("notes")
            .field("note", Field::char(8).nullable().default("x"))
            .build()
            .unwrap(),
    );
    notes.create_table(&mut db).await.unwrap();

    let mut r = Record::new(&notes);
    assert_eq!(r.get("note").unwrap(), json!("x"));
    r.set("note", Value::Null).unwrap();
    r.save(&mut db).await.unwrap();

    let found = Record::find(&mut db, &notes, r.id().unwrap()).await.unwrap();
    assert_eq!(found.get("note").unwrap(), Value::Null);
}
