//! Integration tests for eoka-replay
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use eoka_replay::{EokaPage, Inputs, PageDriver, Replayer, TaskStatus, TaskStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const FORM_PAGE: &str = r#"data:text/html,
<style>body { margin: 0; padding: 20px; }</style>
<input type="text" id="name" name="name">
<button id="greet" onclick="document.getElementById('out').textContent = 'Hello ' + document.getElementById('name').value">Greet</button>
<ul><li class="item">a</li><li class="item">b</li></ul>
<p id="out"></p>
"#;

/// Check if Chrome is available
fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

async fn launch() -> Arc<eoka::Browser> {
    let config = eoka::StealthConfig {
        headless: true,
        ..Default::default()
    };
    Arc::new(
        eoka::Browser::launch_with_config(config)
            .await
            .expect("Failed to launch browser"),
    )
}

async fn close(browser: Arc<eoka::Browser>) {
    if let Ok(browser) = Arc::try_unwrap(browser) {
        browser.close().await.expect("Failed to close browser");
    }
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_replay_form_flow() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let flow = json!({
        "title": "greet",
        "steps": [
            { "type": "navigate", "url": FORM_PAGE },
            { "type": "change", "selectors": [["aria/Name"], ["#name"]], "value": "${who}" },
            { "type": "click", "selectors": [["#greet"]], "offsetX": 5, "offsetY": 5 },
            {
                "type": "waitForElement",
                "selectors": [["xpath///li"]],
                "operator": ">=",
                "count": 2
            },
            {
                "type": "waitForExpression",
                "expression": "document.getElementById('out').textContent.length > 0",
                "assertedEvents": [
                    { "type": "elementText", "selector": "#out", "text": "Hello Ada" }
                ]
            }
        ]
    });
    std::fs::write(dir.path().join("greet.json"), flow.to_string()).unwrap();

    let browser = launch().await;
    let page = EokaPage::open(browser.clone(), "about:blank")
        .await
        .expect("Failed to create page");

    let store = TaskStore::new();
    let replayer = Replayer::new(dir.path(), store.clone());
    let handle = replayer
        .launch("greet.json", Inputs::new().set("who", "Ada"), Arc::new(page))
        .await;
    let entry = handle.wait().await.expect("Replay task failed to join");

    assert_eq!(entry.status, TaskStatus::Completed, "entry: {:?}", entry);
    assert_eq!(entry.result, Some(json!({ "successReplay": true })));

    close(browser).await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_replay_missing_element() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let flow = json!({
        "steps": [
            { "type": "navigate", "url": FORM_PAGE },
            { "type": "click", "selectors": [["#submit"]], "timeout": 500 }
        ]
    });
    std::fs::write(dir.path().join("missing.json"), flow.to_string()).unwrap();

    let browser = launch().await;
    let page = EokaPage::open(browser.clone(), "about:blank")
        .await
        .expect("Failed to create page");

    let replayer = Replayer::new(dir.path(), TaskStore::new());
    let handle = replayer
        .launch("missing.json", Inputs::new(), Arc::new(page))
        .await;
    let entry = handle.wait().await.expect("Replay task failed to join");

    assert_eq!(entry.status, TaskStatus::Failed);
    let error = entry.error.unwrap_or_default();
    assert!(
        error.starts_with("no valid selector found for this step<1>"),
        "error: {}",
        error
    );

    close(browser).await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_page_driver_waits() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = EokaPage::open(browser.clone(), "about:blank")
        .await
        .expect("Failed to create page")
        .with_poll_interval(50);
    let timeout = Duration::from_millis(1000);

    page.goto(FORM_PAGE, timeout).await.expect("Failed to navigate");

    let items = page.locate(".item", timeout).await.expect("Failed to locate");
    assert_eq!(items.matches, 2);

    page.wait_for_count(".item", eoka_replay::CountOperator::Eq, 2, timeout)
        .await
        .expect("count");

    let err = page
        .wait_for_selector("#never", true, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("timeout"), "err: {}", err);

    let value = page.evaluate("1 + 2").await.expect("evaluate");
    assert_eq!(value, json!(3));

    drop(page);
    close(browser).await;
}

const INPUT_PAGE: &str = r#"data:text/html,
<style>body { margin: 0; } button { width: 120px; height: 40px; }</style>
<script>
window.seen = [];
document.addEventListener('keydown', e => window.seen.push(e.key + ':' + e.shiftKey));
</script>
<button id="go" onclick="window.trusted = event.isTrusted; window.clicks = (window.clicks || 0) + 1">Go</button>
"#;

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_page_driver_input_events() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = EokaPage::open(browser.clone(), "about:blank")
        .await
        .expect("Failed to create page")
        .with_poll_interval(50);
    let timeout = Duration::from_millis(1000);

    page.goto(INPUT_PAGE, timeout).await.expect("Failed to navigate");

    page.set_viewport(390, 844).await.expect("set_viewport");
    let width = page.evaluate("window.innerWidth").await.expect("evaluate");
    assert_eq!(width, json!(390));

    page.key_down("Shift").await.expect("key_down Shift");
    page.key_down("A").await.expect("key_down A");
    page.key_up("A").await.expect("key_up A");
    page.key_up("Shift").await.expect("key_up Shift");
    page.key_down("b").await.expect("key_down b");
    page.key_up("b").await.expect("key_up b");
    let seen = page.evaluate("window.seen").await.expect("evaluate");
    assert_eq!(seen, json!(["Shift:true", "A:true", "b:false"]));

    let button = page.locate("[id=go]", timeout).await.expect("locate");
    page.click(&button, 10.0, 10.0, 1, timeout)
        .await
        .expect("click");
    let trusted = page.evaluate("window.trusted").await.expect("evaluate");
    assert_eq!(trusted, json!(true));
    let clicks = page.evaluate("window.clicks").await.expect("evaluate");
    assert_eq!(clicks, json!(1));

    drop(page);
    close(browser).await;
}
