//! Registration scenarios on the simulated backend

use std::path::PathBuf;

use imgreg_common::{ImageRecord, LocalStorage, Origin, STORAGE_KEY};
use imgreg_e2e::{Driver, RunnerConfig, SimulatedPage, TestRunner, TestSpec};
use test_case::test_case;

const BASE: &str = "http://127.0.0.1:8080";
const URL: &str = "https://cdn.mos.cms.futurecdn.net/eM9EvWyDxXcnQTTyH8c8p5-1200-80.jpg";

fn specs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs")
}

fn stored(storage: &LocalStorage) -> Vec<ImageRecord> {
    let origin = Origin::from_url(BASE).unwrap();
    storage
        .get_item(&origin, STORAGE_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
        .unwrap_or_default()
}

fn submit_spec(title: &str, press: &str) -> TestSpec {
    let submit = match press {
        "enter" => "  - action: press\n    key: Enter\n".to_string(),
        _ => "  - action: click\n    selector: '#btnSubmit'\n".to_string(),
    };
    TestSpec::from_yaml(&format!(
        "name: submit-{press}\nsteps:\n  - action: navigate\n    url: /\n  - action: type\n    selector: '#title'\n    text: {title}\n  - action: type\n    selector: '#imageUrl'\n    text: {url}\n{submit}",
        press = press,
        title = title,
        url = URL,
        submit = submit,
    ))
    .unwrap()
}

#[tokio::test]
async fn test_bundled_scenarios_pass() {
    let mut runner = TestRunner::with_config(RunnerConfig {
        specs_dir: specs_dir(),
        ..Default::default()
    })
    .unwrap();

    let suite = runner.run_all().await.unwrap();
    for result in &suite.results {
        assert!(result.success, "{} failed: {:?}", result.name, result.error);
    }
    assert_eq!(suite.total, 4);
    assert_eq!(suite.passed, 4);

    // Every scenario cleans up after itself
    assert!(runner.storage().snapshot_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_tagged_run() {
    let mut runner = TestRunner::with_config(RunnerConfig {
        specs_dir: specs_dir(),
        ..Default::default()
    })
    .unwrap();

    let suite = runner.run_tagged("validation").await.unwrap();
    assert_eq!(suite.total, 1);
    assert_eq!(suite.results[0].name, "invalid-inputs");
    assert!(suite.results[0].success);
}

#[test_case("enter" ; "enter key")]
#[test_case("button" ; "submit button")]
#[tokio::test]
async fn test_submit_triggers_store_the_same_record(press: &str) {
    let storage = LocalStorage::open_memory().unwrap();
    let mut page = SimulatedPage::new(storage.clone(), BASE).unwrap();

    let results = page.run_spec(&submit_spec("Alien BR", press)).await.unwrap();
    assert!(results.iter().all(|r| r.success), "{:?}", results);

    assert_eq!(stored(&storage), vec![ImageRecord::new("Alien BR", URL)]);
}

#[tokio::test]
async fn test_reload_does_not_touch_storage() {
    let storage = LocalStorage::open_memory().unwrap();
    let mut page = SimulatedPage::new(storage.clone(), BASE).unwrap();
    page.run_spec(&submit_spec("Aliens", "button")).await.unwrap();
    page.run_spec(&submit_spec("BR Alien", "enter")).await.unwrap();

    let before = storage.snapshot_all().unwrap();
    for _ in 0..3 {
        page.reload().unwrap();
    }
    assert_eq!(storage.snapshot_all().unwrap(), before);
    assert_eq!(
        stored(&storage),
        vec![ImageRecord::new("Aliens", URL), ImageRecord::new("BR Alien", URL)]
    );
}

#[tokio::test]
async fn test_rejected_submit_writes_nothing() {
    let storage = LocalStorage::open_memory().unwrap();
    let mut page = SimulatedPage::new(storage.clone(), BASE).unwrap();

    let spec = TestSpec::from_yaml(
        r#"
name: bad-url
steps:
  - action: navigate
    url: /
  - action: type
    selector: '#title'
    text: Alien BR
  - action: type
    selector: '#imageUrl'
    text: not a url
  - action: click
    selector: '#btnSubmit'
  - action: assert
    selector: '#urlFeedback'
    visible: true
  - action: assert
    selector: '#titleFeedback'
    visible: false
  - action: assert
    selector: '#title'
    value: Alien BR
"#,
    )
    .unwrap();

    let results = page.run_spec(&spec).await.unwrap();
    assert!(results.iter().all(|r| r.success), "{:?}", results);
    assert!(storage.snapshot_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_records_survive_a_new_profile_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = || RunnerConfig {
        profile_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    {
        let mut runner = TestRunner::with_config(config()).unwrap();
        let result = runner.run_spec(&submit_spec("Aliens", "button")).await.unwrap();
        assert!(result.success, "{:?}", result.error);
    }

    let runner = TestRunner::with_config(config()).unwrap();
    assert_eq!(stored(runner.storage()), vec![ImageRecord::new("Aliens", URL)]);
}

#[tokio::test]
async fn test_submit_after_storage_cleared_keeps_shown_list() {
    let storage = LocalStorage::open_memory().unwrap();
    let mut page = SimulatedPage::new(storage.clone(), BASE).unwrap();

    let spec = TestSpec::from_yaml(&format!(
        r#"
name: cleared-between-submits
steps:
  - action: navigate
    url: /
  - action: type
    selector: '#title'
    text: Aliens
  - action: type
    selector: '#imageUrl'
    text: {url}
  - action: click
    selector: '#btnSubmit'
  - action: clear_storage
  - action: assert_storage
    length: 0
  - action: type
    selector: '#title'
    text: BR Alien
  - action: type
    selector: '#imageUrl'
    text: {url}
  - action: click
    selector: '#btnSubmit'
  - action: assert
    selector: '#card-list .card-img'
    count: 2
  - action: assert_storage
    length: 2
    last:
      title: BR Alien
      imageUrl: {url}
"#,
        url = URL
    ))
    .unwrap();

    let results = page.run_spec(&spec).await.unwrap();
    assert!(results.iter().all(|r| r.success), "{:?}", results);
    assert_eq!(
        stored(&storage),
        vec![ImageRecord::new("Aliens", URL), ImageRecord::new("BR Alien", URL)]
    );
}
