use parcel_db::{BackendError, DbConnection, DbValue};
use tempfile::TempDir;

#[test]
fn second_writer_is_rejected_while_first_is_open() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("parcels.duckdb");

    let first = DbConnection::open_duckdb(&db_path).unwrap();
    let second = DbConnection::open_duckdb(&db_path);
    match second {
        Err(BackendError::Locked(msg)) => {
            assert!(msg.contains(&format!("pid {}", std::process::id())), "{msg}");
        }
        other => panic!("expected Locked, got {:?}", other.map(|_| ())),
    }

    drop(first);
    DbConnection::open_duckdb(&db_path).unwrap();
}

#[test]
fn clones_share_the_lock_until_the_last_one_drops() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("parcels.duckdb");

    let first = DbConnection::open_duckdb(&db_path).unwrap();
    let clone = first.clone();
    drop(first);
    assert!(parcel_db::is_held(&db_path));

    drop(clone);
    assert!(!parcel_db::is_held(&db_path));
}

#[test]
fn data_survives_reopen_and_readonly_rejects_writes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("parcels.duckdb");
    let url = format!("duckdb:{}", db_path.display());

    {
        let conn = DbConnection::open_from_url(&url).unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT, name TEXT)")
            .unwrap();
        conn.execute(
            "INSERT INTO t (id, name) VALUES (?, ?)",
            &[DbValue::from(1_i64), DbValue::from("kept")],
        )
        .unwrap();
    }

    let ro = DbConnection::open_from_url_readonly(&url).unwrap();
    assert!(!ro.is_writable());
    let name: String = ro
        .query_scalar("SELECT name FROM t WHERE id = ?", &[DbValue::from(1_i64)])
        .unwrap();
    assert_eq!(name, "kept");

    let err = ro
        .execute("DELETE FROM t WHERE id = ?", &[DbValue::from(1_i64)])
        .unwrap_err();
    assert!(matches!(err, BackendError::ReadOnly));
}
