use std::cell::RefCell;
use std::rc::Rc;

use simple_query::{
    Document, Error, EventHandler, EventRegistry, ListenerFilter, NativeListener, NodeId, Result,
    SimpleQuery,
};

fn labelled(calls: &Rc<RefCell<Vec<String>>>, label: &'static str) -> EventHandler {
    let calls = Rc::clone(calls);
    EventHandler::new(move |document, event| {
        let receiver = document
            .get_attribute(event.current_target(), "id")
            .unwrap_or_default();
        calls.borrow_mut().push(format!("{label}@{receiver}"));
        Ok(())
    })
}

fn node(document: &Document, selector: &str) -> Result<NodeId> {
    document
        .query_selector(selector)?
        .ok_or_else(|| Error::Dom(format!("missing {selector}")))
}

#[test]
fn click_register_dispatch_unregister_end_to_end() -> Result<()> {
    let document = Document::from_html("<button id='b'>b</button>")?;
    let calls = Rc::new(RefCell::new(Vec::new()));
    let handler = labelled(&calls, "h");
    let forward = handler.clone();
    let native = NativeListener::new(move |document, event| forward.call(document, event));

    let button = node(&document, "#b")?;
    let mut registry = EventRegistry::new();
    registry.register(&document, button, "click", "click", &handler, native)?;
    assert_eq!(registry.count(&ListenerFilter::name("click"))?, 1);

    document.dispatch(button, "click")?;
    assert_eq!(calls.borrow().len(), 1);

    assert_eq!(registry.unregister(&document, &ListenerFilter::name("click"))?, 1);
    assert_eq!(registry.count(&ListenerFilter::name("click"))?, 0);
    document.dispatch(button, "click")?;
    assert_eq!(calls.borrow().len(), 1);

    // A second removal is a quiet no-op.
    assert_eq!(registry.unregister(&document, &ListenerFilter::name("click"))?, 0);
    assert_eq!(registry.count(&ListenerFilter::all())?, 0);
    Ok(())
}

#[test]
fn removing_one_name_keeps_the_rest_in_registration_order() -> Result<()> {
    let document = Document::from_html("<div id='d'></div>")?;
    let calls = Rc::new(RefCell::new(Vec::new()));
    let (h1, h2, h3) = (
        labelled(&calls, "h1"),
        labelled(&calls, "h2"),
        labelled(&calls, "h3"),
    );

    let div = node(&document, "#d")?;
    let mut registry = EventRegistry::new();
    registry.register_handler(&document, div, "click", &h1)?;
    registry.register_handler(&document, div, "click", &h2)?;
    registry.register_handler(&document, div, "mouseover", &h3)?;

    registry.unregister(&document, &ListenerFilter::name_and_handler("mouseover", &h3))?;
    let remaining = registry
        .records()
        .iter()
        .map(|record| record.user_handler().clone())
        .collect::<Vec<_>>();
    assert_eq!(remaining, [h1, h2]);

    document.dispatch(div, "mouseover")?;
    assert!(calls.borrow().is_empty());
    document.dispatch(div, "click")?;
    assert_eq!(*calls.borrow(), ["h1@d", "h2@d"]);
    Ok(())
}

#[test]
fn unfiltered_unregister_detaches_everything() -> Result<()> {
    let document = Document::from_html("<div id='d'></div>")?;
    let calls = Rc::new(RefCell::new(Vec::new()));
    let div = node(&document, "#d")?;
    let mut registry = EventRegistry::new();
    for (name, label) in [("click", "a"), ("keydown", "b"), ("mouseleave", "c"), ("click", "d")] {
        registry.register_handler(&document, div, name, &labelled(&calls, label))?;
    }

    assert_eq!(registry.unregister(&document, &ListenerFilter::all())?, 4);
    assert!(registry.is_empty());
    for native in ["click", "keydown", "mouseout"] {
        assert_eq!(document.listener_count(div, native), 0, "{native}");
    }
    Ok(())
}

#[test]
fn one_registry_spanning_nodes_detaches_each_listener_from_its_own_node() -> Result<()> {
    let document = Document::from_html("<p id='a'></p><p id='b'></p>")?;
    let calls = Rc::new(RefCell::new(Vec::new()));
    let handler = labelled(&calls, "h");
    let a = node(&document, "#a")?;
    let b = node(&document, "#b")?;

    let mut registry = EventRegistry::new();
    registry.register_handler(&document, a, "click", &handler)?;
    registry.register_handler(&document, b, "mouseenter", &handler)?;
    assert_eq!(registry.records()[0].node(), a);
    assert_eq!(registry.records()[1].node(), b);

    assert_eq!(registry.unregister(&document, &ListenerFilter::all())?, 2);
    assert_eq!(document.listener_count(a, "click"), 0);
    assert_eq!(document.listener_count(b, "mouseover"), 0);

    document.dispatch(a, "click")?;
    document.dispatch_mouse(b, "mouseover", None)?;
    assert!(calls.borrow().is_empty());
    Ok(())
}

#[test]
fn mouseenter_fires_on_the_nested_target_with_it_as_receiver() -> Result<()> {
    let document = Document::from_html(
        "<div id='outer'><div id='target'><span id='child'></span></div></div>",
    )?;
    let query = SimpleQuery::new(document.clone());
    let calls = Rc::new(RefCell::new(Vec::new()));

    let mut target = query
        .select("#target")?
        .ok_or_else(|| Error::Dom("missing #target".into()))?;
    target.on_mouseenter(&labelled(&calls, "enter"))?;

    let outer = node(&document, "#outer")?;
    let child = node(&document, "#child")?;
    document.dispatch_mouse(target.node(), "mouseover", Some(outer))?;
    assert_eq!(*calls.borrow(), ["enter@target"]);

    document.dispatch_mouse(target.node(), "mouseover", Some(child))?;
    assert_eq!(calls.borrow().len(), 1);
    Ok(())
}

#[test]
fn handler_registered_twice_needs_one_removal() -> Result<()> {
    let document = Document::from_html("<a id='a'></a>")?;
    let calls = Rc::new(RefCell::new(Vec::new()));
    let handler = labelled(&calls, "h");
    let a = node(&document, "#a")?;

    let mut registry = EventRegistry::new();
    registry.register_handler(&document, a, "click", &handler)?;
    registry.register_handler(&document, a, "click", &handler)?;
    assert_eq!(registry.count(&ListenerFilter::name_and_handler("click", &handler))?, 2);

    document.dispatch(a, "click")?;
    assert_eq!(calls.borrow().len(), 2);

    assert_eq!(registry.unregister(&document, &ListenerFilter::handler(&handler))?, 2);
    assert_eq!(document.listener_count(a, "click"), 0);
    Ok(())
}

#[test]
fn registering_on_an_unknown_node_records_nothing() -> Result<()> {
    let document = Document::new();
    let elsewhere = Document::from_html(&"<b></b>".repeat(10))?;
    let far = elsewhere
        .query_selector_all("b")?
        .pop()
        .ok_or_else(|| Error::Dom("no b".into()))?;

    let mut registry = EventRegistry::new();
    let handler = EventHandler::new(|_, _| Ok(()));
    assert!(matches!(
        registry.register_handler(&document, far, "click", &handler),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(registry.is_empty());
    Ok(())
}
