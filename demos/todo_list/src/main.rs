use anyhow::Context;
use tether_core::*;
use tether_devtools::Inspector;
use tether_navigation::HashRouter;

fn app() -> El {
    let link = |href: &str, label: &str| {
        El::new("a")
            .attr("data-ca-link", "")
            .attr("href", href)
            .child(El::text(label))
    };
    let item = El::new("li")
        .attr("data-ca-for-each", "todo in todos")
        .attr("data-ca-for-index", "i")
        .attr("bind", "data-index: i, data-done: todo.done, click: this.toggle")
        .child(El::new("span").attr("bind", "text: todo.title"))
        .child(
            El::new("span")
                .attr("visible-if", "todo.done")
                .child(El::text(" (done)")),
        );

    El::new("main")
        .child(
            El::new("nav")
                .child(link("/", "Todos"))
                .child(link("/about", "About")),
        )
        .child(
            El::new("section")
                .attr("class", "ca-page")
                .attr("data-ca-route", "/")
                .child(El::new("h1").attr("bind", "text: app.title"))
                .child(
                    El::new("p")
                        .attr("bind", "stats.remaining to text")
                        .attr("visible-if", "stats.total"),
                )
                .child(
                    El::new("p")
                        .attr("visible-if", "!stats.total")
                        .child(El::text("Nothing to do")),
                )
                .child(El::new("ul").attr("id", "todo-list").child(item))
                .child(
                    El::new("button")
                        .attr("id", "add")
                        .attr("bind", "click: actions.add")
                        .child(El::text("Add")),
                ),
        )
        .child(
            El::new("section")
                .attr("class", "ca-page")
                .attr("route", "/about")
                .child(El::new("p").attr("bind", "text: app.about")),
        )
}

fn todo(index: usize, title: &str) -> Value {
    Value::map([
        ("title", Value::from(title)),
        ("done", Value::from(false)),
        (
            "toggle",
            Value::callable(move |store| {
                store.update("todos", |todos| {
                    let done = todos
                        .as_list_mut()
                        .and_then(|list| list.get_mut(index))
                        .and_then(Value::as_map_mut)
                        .and_then(|t| t.get_mut("done"));
                    if let Some(done) = done {
                        *done = Value::from(!done.is_truthy());
                    }
                });
                refresh_stats(store);
            }),
        ),
    ])
}

fn add_todo(store: &ModelStore) {
    let count = store.get("todos").and_then(|t| t.len()).unwrap_or(0);
    let title = format!("Task #{}", count + 1);
    store.update("todos", |todos| {
        if !matches!(todos, Value::List(_)) {
            *todos = Value::list(Vec::<Value>::new());
        }
        if let Some(list) = todos.as_list_mut() {
            list.push(todo(count, &title));
        }
    });
    refresh_stats(store);
}

fn refresh_stats(store: &ModelStore) {
    let (total, done) = store.with(|models| {
        let list = models
            .get("todos")
            .and_then(Value::as_list)
            .unwrap_or_default();
        let done = list
            .iter()
            .filter(|t| t.child("done").is_some_and(Value::is_truthy))
            .count();
        (list.len(), done)
    });
    store.set(
        "stats",
        Value::map([("total", total), ("remaining", total - done)]),
    );
}

fn seed(store: &ModelStore) {
    store.set(
        "app",
        Value::map([
            ("title", "Tether todos"),
            ("about", "A headless demo of declarative bindings."),
        ]),
    );
    store.set("todos", Value::list(Vec::<Value>::new()));
    store.set("actions", Value::map([("add", Value::callable(add_todo))]));
    refresh_stats(store);
}

fn find(rt: &Runtime<Document>, name: &str, value: &str) -> anyhow::Result<NodeId> {
    let root = rt.tree().root();
    rt.tree()
        .find_by_attribute(root, name, value)
        .with_context(|| format!("no node with {name}={value:?}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::var("TETHER_CONFIG") {
        Ok(text) => RuntimeConfig::from_json(&text).context("parsing TETHER_CONFIG")?,
        Err(_) => RuntimeConfig::default(),
    };
    log::info!("Starting todo_list (tick every {:?})", config.tick_interval);

    let mut rt = Runtime::with_config(Document::new(), config.clone());
    let body = rt.tree().root();
    rt.tree_mut().mount(body, app());

    let report = rt.discover(body);
    if !report.is_clean() {
        anyhow::bail!("{} broken declaration(s)", report.errors.len());
    }

    let mut router = HashRouter::new(&config);
    router.discover_pages(rt.tree(), body);
    router.start(rt.tree_mut());
    router.subscribe(|hash| log::info!("route changed to {hash}"));

    seed(rt.store());
    let mut inspector = Inspector::new();
    inspector.hud.toggle();
    inspector.tick(&mut rt);

    let add = find(&rt, "id", "add")?;
    for _ in 0..3 {
        rt.tree().dispatch(add, EventKind::Click)?;
    }
    // Clicks only write to the store; wait for the loop to pick them up.
    rt.run_while(|_, report| report.is_quiet());

    let list = find(&rt, "id", "todo-list")?;
    let second = rt
        .tree()
        .element_children(list)
        .get(1)
        .copied()
        .context("second todo was not rendered")?;
    rt.tree().dispatch(second, EventKind::Click)?;
    inspector.tick(&mut rt);

    println!("{}", inspector.dump(&rt).unwrap_or_default());

    let about = find(&rt, "href", "/about")?;
    router.follow_link(rt.tree_mut(), about);
    inspector.tick(&mut rt);

    println!("\nroute: {}", router.current());
    println!("history: {}", router.history_json());
    println!(
        "store: {}",
        serde_json::to_string_pretty(&rt.store().to_json())?
    );
    Ok(())
}
