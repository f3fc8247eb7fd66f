use super::*;

fn quiet_trace(document: &Document) {
    document.set_trace_stderr(false);
    document.enable_trace(true);
}

#[test]
fn events_bubble_from_target_to_document() -> Result<()> {
    let document = Document::from_html("<div id='outer'><p id='inner'>x</p></div>")?;
    let log = new_log();
    let outer = document.query_selector("#outer")?.unwrap_or(document.body());
    let inner = document.query_selector("#inner")?.unwrap_or(document.body());

    document.add_event_listener(inner, "click", &native_recorder(&log, "inner"))?;
    document.add_event_listener(outer, "click", &native_recorder(&log, "outer"))?;
    document.add_event_listener(document.document_node(), "click", &native_recorder(&log, "doc"))?;

    assert!(document.dispatch(inner, "click")?);
    assert_eq!(taken(&log), ["inner:click", "outer:click", "doc:click"]);

    document.dispatch_event(inner, EventInit::new("click").non_bubbling())?;
    assert_eq!(taken(&log), ["inner:click"]);
    Ok(())
}

#[test]
fn stopping_propagation_and_immediate_propagation() -> Result<()> {
    let document = Document::from_html("<div id='outer'><p id='inner'>x</p></div>")?;
    let log = new_log();
    let outer = document.query_selector("#outer")?.unwrap_or(document.body());
    let inner = document.query_selector("#inner")?.unwrap_or(document.body());

    let stopper = NativeListener::new(|_, event| {
        event.stop_propagation();
        Ok(())
    });
    document.add_event_listener(inner, "click", &stopper)?;
    document.add_event_listener(inner, "click", &native_recorder(&log, "same-node"))?;
    document.add_event_listener(outer, "click", &native_recorder(&log, "outer"))?;
    document.dispatch(inner, "click")?;
    assert_eq!(taken(&log), ["same-node:click"]);

    let halt = NativeListener::new(|_, event| {
        event.stop_immediate_propagation();
        Ok(())
    });
    document.add_event_listener(outer, "keyup", &halt)?;
    document.add_event_listener(outer, "keyup", &native_recorder(&log, "skipped"))?;
    document.dispatch(outer, "keyup")?;
    assert!(taken(&log).is_empty());
    Ok(())
}

#[test]
fn native_table_dedupes_identical_listeners() -> Result<()> {
    let document = Document::from_html("<b id='b'></b>")?;
    let node = document.query_selector("#b")?.unwrap_or(document.body());
    let log = new_log();
    let listener = native_recorder(&log, "once");

    assert!(document.add_event_listener(node, "click", &listener)?);
    assert!(!document.add_event_listener(node, "click", &listener.clone())?);
    assert_eq!(document.listener_count(node, "click"), 1);
    assert!(document.remove_event_listener(node, "click", &listener));
    assert!(!document.remove_event_listener(node, "click", &listener));
    assert!(matches!(
        document.add_event_listener(node, "", &listener),
        Err(Error::InvalidArgument { .. })
    ));
    Ok(())
}

#[test]
fn listener_removed_mid_dispatch_does_not_run() -> Result<()> {
    let document = Document::from_html("<b id='b'></b>")?;
    let node = document.query_selector("#b")?.unwrap_or(document.body());
    let log = new_log();
    let victim = native_recorder(&log, "victim");

    let target = victim.clone();
    let remover = NativeListener::new(move |document, event| {
        document.remove_event_listener(event.current_target(), "click", &target);
        Ok(())
    });
    document.add_event_listener(node, "click", &remover)?;
    document.add_event_listener(node, "click", &victim)?;

    document.dispatch(node, "click")?;
    assert!(taken(&log).is_empty());
    Ok(())
}

#[test]
fn once_listeners_run_a_single_time() -> Result<()> {
    let document = Document::from_html("<b id='b'></b>")?;
    let node = document.query_selector("#b")?.unwrap_or(document.body());
    let log = new_log();
    document.add_event_listener_once(node, "click", &native_recorder(&log, "one"))?;

    document.dispatch(node, "click")?;
    document.dispatch(node, "click")?;
    assert_eq!(taken(&log), ["one:click"]);
    Ok(())
}

#[test]
fn runaway_nested_dispatch_hits_the_depth_limit() -> Result<()> {
    let document = Document::from_html("<b id='b'></b>")?;
    let node = document.query_selector("#b")?.unwrap_or(document.body());
    document.set_dispatch_depth_limit(8)?;

    let recurse = NativeListener::new(|document, event| {
        document.dispatch(event.current_target(), "ping").map(|_| ())
    });
    document.add_event_listener(node, "ping", &recurse)?;

    match document.dispatch(node, "ping") {
        Err(Error::Dom(message)) => assert!(message.contains("nesting limit of 8")),
        other => panic!("expected depth error, got {other:?}"),
    }

    // The depth counter unwinds, so later dispatches work again.
    document.remove_event_listener(node, "ping", &recurse);
    assert!(document.dispatch(node, "ping")?);
    assert!(matches!(
        document.set_dispatch_depth_limit(0),
        Err(Error::InvalidArgument { .. })
    ));
    Ok(())
}

#[test]
fn ready_state_only_moves_forward() -> Result<()> {
    let document = Document::loading();
    let log = new_log();
    let root = document.document_node();
    document.add_event_listener(root, "DOMContentLoaded", &native_recorder(&log, "doc"))?;
    document.add_event_listener(root, "load", &native_recorder(&log, "doc"))?;

    document.set_ready_state(ReadyState::Complete)?;
    assert_eq!(taken(&log), ["doc:DOMContentLoaded", "doc:load"]);
    assert!(matches!(
        document.set_ready_state(ReadyState::Interactive),
        Err(Error::InvalidArgument { .. })
    ));
    document.set_ready_state(ReadyState::Complete)?;
    assert!(taken(&log).is_empty());
    Ok(())
}

#[test]
fn trace_records_listener_changes_and_dispatches() -> Result<()> {
    let query = query_for("<button id='go'></button>")?;
    let document = query.document().clone();
    quiet_trace(&document);

    let handler = EventHandler::new(|_, _| Ok(()));
    let mut button = select(&query, "#go")?;
    button.on_click(&handler)?.trigger_click()?.off_click(None)?;

    assert_eq!(
        document.take_trace_logs(),
        [
            "[listener] add click node=#go",
            "[event] click target=#go current=#go default_prevented=false",
            "[event] done click target=#go current=document outcome=completed default_prevented=false propagation_stopped=false",
            "[listener] remove click node=#go",
        ]
    );
    assert!(document.take_trace_logs().is_empty());
    Ok(())
}

#[test]
fn trace_filters_and_limit() -> Result<()> {
    let document = Document::from_html("<p></p>")?;
    let node = document.query_selector("p")?.unwrap_or(document.body());
    quiet_trace(&document);
    document.set_trace_events(false);

    let listener = NativeListener::new(|_, _| Ok(()));
    document.add_event_listener(node, "click", &listener)?;
    document.dispatch(node, "click")?;
    assert_eq!(document.take_trace_logs(), ["[listener] add click node=p"]);

    document.set_trace_events(true);
    document.set_trace_listeners(false);
    document.set_trace_log_limit(1)?;
    document.dispatch(node, "click")?;
    let logs = document.take_trace_logs();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("[event] done click target=p"));

    assert!(matches!(
        document.set_trace_log_limit(0),
        Err(Error::InvalidArgument { .. })
    ));
    document.enable_trace(false);
    document.dispatch(node, "click")?;
    assert!(document.take_trace_logs().is_empty());
    Ok(())
}

#[test]
fn failing_listener_is_traced_as_error() -> Result<()> {
    let document = Document::from_html("<p id='p'></p>")?;
    let node = document.query_selector("#p")?.unwrap_or(document.body());
    quiet_trace(&document);
    document.set_trace_listeners(false);

    let failing = NativeListener::new(|_, _| Err(Error::Handler("bad".into())));
    document.add_event_listener(node, "input", &failing)?;
    assert!(document.dispatch(node, "input").is_err());

    let logs = document.take_trace_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs[1].contains("outcome=error"));
    Ok(())
}
