use super::*;

use std::cell::RefCell;
use std::rc::Rc;

mod content_and_tree;
mod dispatch_and_trace;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// A handler that appends `label` to `log` every time it runs.
fn recorder(log: &Log, label: &str) -> EventHandler {
    let log = Rc::clone(log);
    let label = label.to_string();
    EventHandler::new(move |_, _| {
        log.borrow_mut().push(label.clone());
        Ok(())
    })
}

fn native_recorder(log: &Log, label: &str) -> NativeListener {
    let log = Rc::clone(log);
    let label = label.to_string();
    NativeListener::new(move |_, event| {
        log.borrow_mut()
            .push(format!("{label}:{}", event.event_type()));
        Ok(())
    })
}

fn taken(log: &Log) -> Vec<String> {
    log.borrow_mut().drain(..).collect()
}

fn query_for(body: &str) -> Result<SimpleQuery> {
    Ok(SimpleQuery::new(Document::from_html(body)?))
}

fn select(query: &SimpleQuery, selector: &str) -> Result<ElementWrapper> {
    query
        .select(selector)?
        .ok_or_else(|| Error::Dom(format!("nothing matches {selector}")))
}
