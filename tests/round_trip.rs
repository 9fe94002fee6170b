use hpc_ts::{is_missing, AttrValue, Container, Observation, TimeSeries};
use tempfile::tempdir;
use time::macros::datetime;
use time::Duration;

#[test]
fn commit_flush_attach_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("2017-08-27").join("cori_snx11168.hpcts");
    let start = datetime!(2017-08-27 00:00 UTC);

    let mut ts = TimeSeries::new("/bytes/readrates", start, start + Duration::minutes(1), 10)
        .expect("series");
    let observations = [
        Observation::new(start, "snx11168n010", 4.0),
        Observation::new(start + Duration::seconds(10), "snx11168n002", 0.0),
        Observation::new(start + Duration::seconds(50), "snx11168n001", 1.5),
        // past the grid
        Observation::new(start + Duration::minutes(5), "snx11168n001", 9.0),
    ];
    assert_eq!(ts.extend_observations(observations), 3);
    ts.group_metadata_mut().insert("site".into(), "nersc".into());

    let mut container = Container::create(&path);
    ts.commit(&mut container).expect("commit");
    container.flush().expect("flush");
    drop(container);

    let container = Container::open(&path).expect("open");
    let back = TimeSeries::attach(&container, "/bytes/readrates").expect("attach");

    assert_eq!(back.timestamps(), ts.timestamps());
    assert_eq!(back.time0(), start.unix_timestamp());
    assert_eq!(back.timestep(), 10);
    assert_eq!(
        back.columns(),
        &["snx11168n001", "snx11168n002", "snx11168n010"]
    );
    assert_eq!(back.dataset(), ts.dataset());
    assert_eq!(back.group_metadata()["site"], AttrValue::from("nersc"));

    // measured zero and never measured stay distinct on disk
    let zero = back.value(1, "snx11168n002").expect("cell");
    assert_eq!(zero, 0.0);
    assert!(!zero.is_sign_negative());
    assert!(is_missing(back.value(0, "snx11168n002").expect("cell")));
    assert_eq!(back.missing_count(), 6 * 3 - 3);
}

#[test]
fn repeated_commits_keep_column_order() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("day.hpcts");
    let start = datetime!(2017-08-27 00:00 UTC);
    let end = start + Duration::seconds(30);

    let mut first = TimeSeries::new("/g/load", start, end, 10).expect("series");
    for name in ["bb10", "bb2", "bb1"] {
        first.insert_element(start, name, 1.0);
    }
    let mut container = Container::create(&path);
    first.commit(&mut container).expect("commit");
    container.flush().expect("flush");

    let mut container = Container::open(&path).expect("open");
    let mut second = TimeSeries::new("/g/load", start, end, 10).expect("series");
    second.insert_element(start, "bb2", 7.0);
    second.insert_element(start, "bb10", 8.0);
    second.insert_element(start, "bb1", 6.0);
    second.commit(&mut container).expect("commit");
    container.flush().expect("flush");

    let container = Container::open(&path).expect("open");
    let back = TimeSeries::attach(&container, "/g/load").expect("attach");
    assert_eq!(back.columns(), &["bb1", "bb2", "bb10"]);
    assert_eq!(back.value(0, "bb10"), Some(8.0));
    assert!(is_missing(back.value(1, "bb1").expect("cell")));
    assert!(is_missing(back.value(2, "bb2").expect("cell")));
}

#[test]
fn deltas_after_attach() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("day.hpcts");
    let start = datetime!(2017-08-27 00:00 UTC);

    let mut ts = TimeSeries::new("/io/bytes", start, start + Duration::seconds(60), 10)
        .expect("series");
    for (i, v) in [10.0, 20.0, 0.0, 0.0, 5.0, 15.0].into_iter().enumerate() {
        ts.insert_element(start + Duration::seconds(10 * i as i64), "ost0", v);
    }
    let mut container = Container::create(&path);
    ts.commit(&mut container).expect("commit");
    container.flush().expect("flush");

    let container = Container::open(&path).expect("open");
    let mut back = TimeSeries::attach(&container, "/io/bytes").expect("attach");
    back.convert_to_deltas();

    assert_eq!(back.num_rows(), 5);
    assert_eq!(back.timestamps().len(), 5);
    let deltas: Vec<f64> = back.dataset().column(0).to_vec();
    assert_eq!(deltas[0], 10.0);
    assert!(deltas[1..4].iter().all(|v| is_missing(*v)));
    assert_eq!(deltas[4], 10.0);
}
