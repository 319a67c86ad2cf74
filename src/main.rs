use std::sync::{Arc, Mutex};
use webview_interop::{
    init_logging, Bridge, BridgeConfig, BridgeResult, CapabilityTable, Exposed, QuickJsSurface,
    Surface,
};

/// Page used when no script path is given
///
/// Stubs are injected once the page has loaded, so the page does its work
/// in `main`, which the host calls afterwards.
const DEMO_PAGE: &str = r#"
external.notify("page loaded");
function main() {
    wtjs.setTitle("Hello from the page");
    wtjs.add(20, 22).then(function (sum) {
        console.log("add resolved with", String(sum));
        wtjs.title = "Answer: " + sum;
        return wtjs.title;
    }).then(function (title) {
        console.log("title is now", title);
    });
    wtjs.say("This will be spoken");
    if (wtjs.missing === undefined) {
        console.log("unknown members are simply absent");
    }
}
"#;

#[derive(Default)]
struct DemoWindow {
    title: Mutex<String>,
    spoken: Mutex<Vec<String>>,
}

impl Exposed for DemoWindow {
    fn capabilities() -> BridgeResult<CapabilityTable<Self>> {
        CapabilityTable::builder()
            .method("setTitle", |w: &DemoWindow, (title,): (String,)| {
                tracing::info!("setTitle({:?})", title);
                *lock(&w.title) = title;
            })
            .method("say", |w: &DemoWindow, (text,): (String,)| {
                tracing::info!("say({:?})", text);
                lock(&w.spoken).push(text);
            })
            .method_with_return("add", |_: &DemoWindow, (a, b): (i64, i64)| a + b)
            .property(
                "title",
                |w: &DemoWindow| lock(&w.title).clone(),
                |w: &DemoWindow, title: String| *lock(&w.title) = title,
            )
            .build()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = BridgeConfig::load_or_default();
    config.validate()?;
    init_logging(&config.logging);

    let page = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEMO_PAGE.to_string(),
    };

    let surface = Arc::new(QuickJsSurface::new()?);
    let bridge = Bridge::with_config(Arc::clone(&surface), config);
    bridge.on_notification(|message| tracing::info!("Notification: {}", message));

    let window = Arc::new(DemoWindow::default());
    bridge.expose("wtjs", &window)?;

    surface.navigate(&page)?;
    surface.evaluate_script("typeof main === 'function' && main()")?;
    let delivered = surface.pump();

    tracing::info!(
        "Delivered {} messages; title = {:?}, spoken = {:?}",
        delivered,
        lock(&window.title),
        lock(&window.spoken)
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Interop demo failed: {}", e);
        std::process::exit(1);
    }
}
