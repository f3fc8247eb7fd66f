use std::cell::RefCell;
use std::rc::Rc;

use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};
use simple_query::{Document, ElementWrapper, EventHandler, SimpleQuery, native_event_name};

const REGISTRY_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/registry_property_fuzz_test.txt";
const DEFAULT_REGISTRY_PROPTEST_CASES: u32 = 128;

const EVENT_NAMES: [&str; 4] = ["click", "keyup", "mouseenter", "mouseleave"];
const HANDLER_COUNT: usize = 3;

#[derive(Clone, Debug)]
enum RegistryAction {
    Add { name: usize, handler: usize },
    Remove { name: Option<usize>, handler: Option<usize> },
    Fire { name: usize },
}

fn registry_proptest_cases() -> u32 {
    std::env::var("SIMPLE_QUERY_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_REGISTRY_PROPTEST_CASES)
}

fn registry_action_strategy() -> BoxedStrategy<RegistryAction> {
    let name = 0..EVENT_NAMES.len();
    let handler = 0..HANDLER_COUNT;
    prop_oneof![
        4 => (name.clone(), handler.clone())
            .prop_map(|(name, handler)| RegistryAction::Add { name, handler }),
        2 => (proptest::option::of(name.clone()), proptest::option::of(handler))
            .prop_map(|(name, handler)| RegistryAction::Remove { name, handler }),
        3 => name.prop_map(|name| RegistryAction::Fire { name }),
    ]
    .boxed()
}

fn registry_action_sequence_strategy() -> BoxedStrategy<Vec<RegistryAction>> {
    vec(registry_action_strategy(), 1..40).boxed()
}

fn fail(err: simple_query::Error) -> TestCaseError {
    TestCaseError::fail(format!("{err:?}"))
}

struct Fixture {
    document: Document,
    outside: simple_query::NodeId,
    target: ElementWrapper,
    handlers: Vec<EventHandler>,
    calls: Rc<RefCell<Vec<usize>>>,
}

impl Fixture {
    fn new() -> simple_query::Result<Self> {
        let document = Document::from_html("<div id='target'><span>x</span></div><p id='outside'></p>")?;
        let query = SimpleQuery::new(document.clone());
        let missing = || simple_query::Error::Dom("fixture markup changed".into());
        let target = query.select("#target")?.ok_or_else(missing)?;
        let outside = query.select("#outside")?.ok_or_else(missing)?.node();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let handlers = (0..HANDLER_COUNT)
            .map(|index| {
                let calls = Rc::clone(&calls);
                EventHandler::new(move |_, _| {
                    calls.borrow_mut().push(index);
                    Ok(())
                })
            })
            .collect();

        Ok(Self {
            document,
            outside,
            target,
            handlers,
            calls,
        })
    }

    fn fire(&self, name: &str) -> simple_query::Result<Vec<usize>> {
        let node = self.target.node();
        match name {
            "mouseenter" | "mouseleave" => {
                self.document
                    .dispatch_mouse(node, native_event_name(name), Some(self.outside))?;
            }
            _ => {
                self.document.dispatch(node, name)?;
            }
        }
        Ok(self.calls.borrow_mut().drain(..).collect())
    }
}

fn assert_registry_matches_model(actions: &[RegistryAction]) -> TestCaseResult {
    let mut fixture = Fixture::new().map_err(fail)?;
    // (event name index, handler index) in registration order.
    let mut model: Vec<(usize, usize)> = Vec::new();

    for action in actions {
        match action {
            RegistryAction::Add { name, handler } => {
                fixture
                    .target
                    .on_event(EVENT_NAMES[*name], &fixture.handlers[*handler])
                    .map_err(fail)?;
                model.push((*name, *handler));
            }
            RegistryAction::Remove { name, handler } => {
                let handler_ref = handler.map(|index| &fixture.handlers[index]);
                fixture
                    .target
                    .off_event(name.map(|index| EVENT_NAMES[index]), handler_ref)
                    .map_err(fail)?;
                model.retain(|(n, h)| {
                    !(name.is_none_or(|name| name == *n) && handler.is_none_or(|handler| handler == *h))
                });
            }
            RegistryAction::Fire { name } => {
                let fired = fixture.fire(EVENT_NAMES[*name]).map_err(fail)?;
                let expected = model
                    .iter()
                    .filter(|(n, _)| n == name)
                    .map(|(_, h)| *h)
                    .collect::<Vec<_>>();
                prop_assert_eq!(fired, expected, "fire {} after {:?}", EVENT_NAMES[*name], action);
            }
        }

        let total = fixture.target.event_count(None, None).map_err(fail)?;
        prop_assert_eq!(total, model.len());

        for (index, name) in EVENT_NAMES.iter().enumerate() {
            let counted = fixture
                .target
                .event_count(Some(name), None)
                .map_err(fail)?;
            let expected = model.iter().filter(|(n, _)| *n == index).count();
            prop_assert_eq!(counted, expected, "count for {}", name);

            let native = fixture
                .document
                .listener_count(fixture.target.node(), native_event_name(name));
            prop_assert_eq!(native, expected, "native listeners for {}", name);
        }

        for (index, handler) in fixture.handlers.iter().enumerate() {
            let counted = fixture
                .target
                .event_count(None, Some(handler))
                .map_err(fail)?;
            prop_assert_eq!(counted, model.iter().filter(|(_, h)| *h == index).count());
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: registry_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(REGISTRY_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn registry_tracks_native_subscriptions(actions in registry_action_sequence_strategy()) {
        assert_registry_matches_model(&actions)?;
    }
}
