//! Streaming rewrite engine.
//!
//! A [`StatefulHandler`] keeps a stack of [`State`]s and dispatches every
//! SAX event to the state on top. States change only on element
//! boundaries: a start tag can hand control to a new state, and the state
//! gives control back once the end tag that balances its first start tag
//! arrives. Everything else passes through the current state to the
//! downstream handler.
//!
//! ```
//! use oxfxml::parser::{parse_sax, ParseOptions};
//! use oxfxml::rewrite::{DocumentRootState, StatefulHandler};
//! use oxfxml::serial::{SerializeOptions, XmlWriter};
//!
//! let writer = XmlWriter::with_options(SerializeOptions::default().xml_declaration(false));
//! let mut handler = StatefulHandler::new(Box::new(DocumentRootState::new()), writer);
//! parse_sax("<!--gone--> <r>kept</r>", &ParseOptions::default(), &mut handler).unwrap();
//! assert_eq!(handler.into_inner().into_string(), "<r>kept</r>\n");
//! ```

mod root;
pub mod url;

pub use root::{DocumentRootState, FragmentRootState};
pub use url::{
    url_rewrite_handler, ContextPathRewriter, NoRewriteState, RewriteOptions, RewriteState,
    UrlRewriter,
};

use log::{trace, warn};

use crate::sax::{Attributes, ContentHandler};

/// What a state wants after handling a start tag.
pub enum Transition {
    /// Keep the current state. Its depth goes up by one.
    Stay,
    /// Push `state` and hand it the same start tag. Nothing has been
    /// forwarded for the tag yet.
    Delegate(Box<dyn State>),
    /// Push `state` as the owner of the element whose start tag the
    /// current state already forwarded. It starts at depth one, so the
    /// matching end tag returns control.
    Enter(Box<dyn State>),
}

/// What a state wants after handling an end tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Continue,
    /// The state's first element is closed; control goes back to the
    /// state below it.
    Return,
}

/// One mode of a streaming rewrite.
///
/// Implementors provide depth storage and override the hooks and
/// pass-through callbacks they need. The defaults forward every event to
/// `out` unchanged.
#[allow(unused_variables)]
pub trait State {
    /// Unmatched start tags seen while this state was current.
    fn depth(&self) -> usize;

    fn depth_mut(&mut self) -> &mut usize;

    /// Name used in log messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handles a start tag. Returning [`Transition::Stay`] means this
    /// state has dealt with the tag.
    fn start_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        out.start_element(uri, local_name, qname, attributes);
        Transition::Stay
    }

    /// Handles an end tag before the depth is updated.
    fn end_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) {
        out.end_element(uri, local_name, qname);
    }

    /// Called on the state below a popped state, with the popped state.
    fn on_return(&mut self, out: &mut dyn ContentHandler, finished: Box<dyn State>) {}

    /// Runs [`start_element_start`](Self::start_element_start) and counts
    /// the tag if the state stays current.
    fn handle_start_element(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        let transition = self.start_element_start(out, uri, local_name, qname, attributes);
        if matches!(transition, Transition::Stay) {
            *self.depth_mut() += 1;
        }
        transition
    }

    /// Runs [`end_element_start`](Self::end_element_start) and unwinds the
    /// depth. An end tag arriving at depth zero has no matching start in
    /// this state; it is logged and dropped.
    fn handle_end_element(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) -> Completion {
        if self.depth() == 0 {
            warn!(
                "{}: dropping unbalanced end tag </{qname}>",
                self.name()
            );
            return Completion::Continue;
        }
        self.end_element_start(out, uri, local_name, qname);
        *self.depth_mut() -= 1;
        if self.depth() == 0 {
            Completion::Return
        } else {
            Completion::Continue
        }
    }

    fn set_document_locator(&mut self, out: &mut dyn ContentHandler, system_id: Option<&str>) {
        out.set_document_locator(system_id);
    }

    fn start_document(&mut self, out: &mut dyn ContentHandler) {
        out.start_document();
    }

    fn end_document(&mut self, out: &mut dyn ContentHandler) {
        out.end_document();
    }

    fn start_prefix_mapping(&mut self, out: &mut dyn ContentHandler, prefix: &str, uri: &str) {
        out.start_prefix_mapping(prefix, uri);
    }

    fn end_prefix_mapping(&mut self, out: &mut dyn ContentHandler, prefix: &str) {
        out.end_prefix_mapping(prefix);
    }

    fn characters(&mut self, out: &mut dyn ContentHandler, text: &str) {
        out.characters(text);
    }

    fn ignorable_whitespace(&mut self, out: &mut dyn ContentHandler, text: &str) {
        out.ignorable_whitespace(text);
    }

    fn cdata(&mut self, out: &mut dyn ContentHandler, text: &str) {
        out.cdata(text);
    }

    fn processing_instruction(&mut self, out: &mut dyn ContentHandler, target: &str, data: &str) {
        out.processing_instruction(target, data);
    }

    fn skipped_entity(&mut self, out: &mut dyn ContentHandler, name: &str) {
        out.skipped_entity(name);
    }

    fn comment(&mut self, out: &mut dyn ContentHandler, text: &str) {
        out.comment(text);
    }
}

/// Drives a stack of states over an event stream.
///
/// The bottom state is never popped: a `Return` from it is ignored.
///
/// A state that was delegated a start tag and passes it on again, with
/// [`Transition::Delegate`] or [`Transition::Enter`], owns no element. It
/// stays below the state that ends up owning the tag and leaves the stack
/// together with it.
pub struct StatefulHandler<H> {
    out: H,
    stack: Vec<Frame>,
}

struct Frame {
    state: Box<dyn State>,
    /// Delegated states below this one that were handed its element and
    /// leave the stack with it.
    carried: usize,
}

impl Frame {
    fn new(state: Box<dyn State>) -> Self {
        Self { state, carried: 0 }
    }
}

impl<H: ContentHandler> StatefulHandler<H> {
    pub fn new(initial: Box<dyn State>, out: H) -> Self {
        Self {
            out,
            stack: vec![Frame::new(initial)],
        }
    }

    /// The state events currently go to.
    #[must_use]
    pub fn current(&self) -> Option<&dyn State> {
        self.stack.last().map(|frame| &*frame.state)
    }

    /// Number of states on the stack, the bottom one included.
    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn get_ref(&self) -> &H {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut H {
        &mut self.out
    }

    pub fn into_inner(self) -> H {
        self.out
    }

    /// Pops the current state and the delegated states it carries.
    fn pop(&mut self) {
        let mut remaining = 1;
        while remaining > 0 && self.stack.len() >= 2 {
            let Some(finished) = self.stack.pop() else {
                return;
            };
            remaining += finished.carried;
            remaining -= 1;
            trace!(
                "return from {} to depth {} of the state stack",
                finished.state.name(),
                self.stack.len()
            );
            if let Some(below) = self.stack.last_mut() {
                below.state.on_return(&mut self.out, finished.state);
            }
        }
    }
}

/// Forwards an event to the current state.
macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        if let Some(frame) = $self.stack.last_mut() {
            frame.state.$method(&mut $self.out $(, $arg)*);
        }
    };
}

impl<H: ContentHandler> ContentHandler for StatefulHandler<H> {
    fn set_document_locator(&mut self, system_id: Option<&str>) {
        dispatch!(self, set_document_locator, system_id);
    }

    fn start_document(&mut self) {
        dispatch!(self, start_document);
    }

    fn end_document(&mut self) {
        dispatch!(self, end_document);
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        dispatch!(self, start_prefix_mapping, prefix, uri);
    }

    fn end_prefix_mapping(&mut self, prefix: &str) {
        dispatch!(self, end_prefix_mapping, prefix);
    }

    fn start_element(&mut self, uri: &str, local_name: &str, qname: &str, attributes: &Attributes) {
        let mut pushed = false;
        let mut carried = 0;
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return;
            };
            let state = &mut frame.state;
            match state.handle_start_element(&mut self.out, uri, local_name, qname, attributes) {
                Transition::Stay => {
                    frame.carried += carried;
                    return;
                }
                Transition::Delegate(next) => {
                    trace!("<{qname}> delegated from {} to {}", state.name(), next.name());
                    if pushed {
                        carried += 1;
                    }
                    self.stack.push(Frame::new(next));
                    pushed = true;
                }
                Transition::Enter(mut next) => {
                    trace!("<{qname}> entered {} from {}", next.name(), state.name());
                    if pushed {
                        carried += 1;
                    }
                    *next.depth_mut() += 1;
                    self.stack.push(Frame {
                        state: next,
                        carried,
                    });
                    return;
                }
            }
        }
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if frame.state.handle_end_element(&mut self.out, uri, local_name, qname) == Completion::Return {
            self.pop();
        }
    }

    fn characters(&mut self, text: &str) {
        dispatch!(self, characters, text);
    }

    fn ignorable_whitespace(&mut self, text: &str) {
        dispatch!(self, ignorable_whitespace, text);
    }

    fn cdata(&mut self, text: &str) {
        dispatch!(self, cdata, text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        dispatch!(self, processing_instruction, target, data);
    }

    fn skipped_entity(&mut self, name: &str) {
        dispatch!(self, skipped_entity, name);
    }

    fn comment(&mut self, text: &str) {
        dispatch!(self, comment, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl ContentHandler for Log {
        fn start_element(&mut self, _uri: &str, _local: &str, qname: &str, _atts: &Attributes) {
            self.0.push(format!("<{qname}>"));
        }
        fn end_element(&mut self, _uri: &str, _local: &str, qname: &str) {
            self.0.push(format!("</{qname}>"));
        }
        fn characters(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
    }

    /// Forwards everything and counts how often it returned.
    #[derive(Default)]
    struct Counting {
        depth: usize,
    }

    impl State for Counting {
        fn depth(&self) -> usize {
            self.depth
        }
        fn depth_mut(&mut self) -> &mut usize {
            &mut self.depth
        }
    }

    /// Delegates every `<sub>` to a fresh `Counting` state and uppercases
    /// text seen while it is current.
    #[derive(Default)]
    struct Outer {
        depth: usize,
        returns: usize,
    }

    impl State for Outer {
        fn depth(&self) -> usize {
            self.depth
        }
        fn depth_mut(&mut self) -> &mut usize {
            &mut self.depth
        }
        fn start_element_start(
            &mut self,
            out: &mut dyn ContentHandler,
            uri: &str,
            local_name: &str,
            qname: &str,
            attributes: &Attributes,
        ) -> Transition {
            match local_name {
                "sub" => return Transition::Delegate(Box::new(Counting::default())),
                "form" => return Transition::Delegate(Box::new(Entering { depth: 0 })),
                "relay" => return Transition::Delegate(Box::new(Relay { depth: 0 })),
                _ => {}
            }
            out.start_element(uri, local_name, qname, attributes);
            Transition::Stay
        }
        fn on_return(&mut self, _out: &mut dyn ContentHandler, _finished: Box<dyn State>) {
            self.returns += 1;
        }
        fn characters(&mut self, out: &mut dyn ContentHandler, text: &str) {
            out.characters(&text.to_uppercase());
        }
    }

    fn start(handler: &mut dyn ContentHandler, name: &str) {
        handler.start_element("", name, name, &Attributes::new());
    }

    fn end(handler: &mut dyn ContentHandler, name: &str) {
        handler.end_element("", name, name);
    }

    #[test]
    fn test_stay_counts_depth() {
        let mut state = Counting::default();
        let mut log = Log::default();
        for _ in 0..3 {
            let t = state.handle_start_element(&mut log, "", "a", "a", &Attributes::new());
            assert!(matches!(t, Transition::Stay));
        }
        assert_eq!(state.depth(), 3);
        assert_eq!(state.handle_end_element(&mut log, "", "a", "a"), Completion::Continue);
        assert_eq!(state.handle_end_element(&mut log, "", "a", "a"), Completion::Continue);
        assert_eq!(state.handle_end_element(&mut log, "", "a", "a"), Completion::Return);
        assert_eq!(log.0.len(), 6);
    }

    #[test]
    fn test_unbalanced_end_is_dropped() {
        let mut state = Counting::default();
        let mut log = Log::default();
        assert_eq!(state.handle_end_element(&mut log, "", "a", "a"), Completion::Continue);
        assert_eq!(state.depth(), 0);
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_delegate_and_return() {
        let mut handler = StatefulHandler::new(Box::new(Outer::default()), Log::default());
        start(&mut handler, "root");
        handler.characters("a");
        start(&mut handler, "sub");
        assert_eq!(handler.stack_len(), 2);
        start(&mut handler, "inner");
        handler.characters("b");
        end(&mut handler, "inner");
        assert_eq!(handler.stack_len(), 2);
        end(&mut handler, "sub");
        assert_eq!(handler.stack_len(), 1);
        handler.characters("c");
        end(&mut handler, "root");

        assert_eq!(
            handler.get_ref().0,
            vec!["<root>", "A", "<sub>", "<inner>", "b", "</inner>", "</sub>", "C", "</root>"]
        );
    }

    #[test]
    fn test_bottom_state_is_never_popped() {
        let mut handler = StatefulHandler::new(Box::new(Counting::default()), Log::default());
        start(&mut handler, "a");
        end(&mut handler, "a");
        end(&mut handler, "stray");
        assert_eq!(handler.stack_len(), 1);
        assert_eq!(handler.current().map(|s| s.depth()), Some(0));
        assert_eq!(handler.into_inner().0, vec!["<a>", "</a>"]);
    }

    struct Entering {
        depth: usize,
    }

    impl State for Entering {
        fn depth(&self) -> usize {
            self.depth
        }
        fn depth_mut(&mut self) -> &mut usize {
            &mut self.depth
        }
        fn start_element_start(
            &mut self,
            out: &mut dyn ContentHandler,
            uri: &str,
            local_name: &str,
            qname: &str,
            attributes: &Attributes,
        ) -> Transition {
            out.start_element(uri, local_name, qname, attributes);
            if local_name == "form" {
                Transition::Enter(Box::new(Counting::default()))
            } else {
                Transition::Stay
            }
        }
    }

    #[test]
    fn test_enter_owns_forwarded_element() {
        let mut handler = StatefulHandler::new(Box::new(Entering { depth: 0 }), Log::default());
        start(&mut handler, "root");
        start(&mut handler, "form");
        assert_eq!(handler.stack_len(), 2);
        assert_eq!(handler.current().map(|s| s.depth()), Some(1));
        start(&mut handler, "input");
        end(&mut handler, "input");
        end(&mut handler, "form");
        assert_eq!(handler.stack_len(), 1);
        end(&mut handler, "root");
        assert_eq!(handler.current().map(|s| s.depth()), Some(0));
    }

    /// Hands every element it is given to a fresh `Counting` state.
    struct Relay {
        depth: usize,
    }

    impl State for Relay {
        fn depth(&self) -> usize {
            self.depth
        }
        fn depth_mut(&mut self) -> &mut usize {
            &mut self.depth
        }
        fn start_element_start(
            &mut self,
            _out: &mut dyn ContentHandler,
            _uri: &str,
            _local_name: &str,
            _qname: &str,
            _attributes: &Attributes,
        ) -> Transition {
            Transition::Delegate(Box::new(Counting::default()))
        }
    }

    #[test]
    fn test_delegated_state_that_enters_leaves_with_owner() {
        let mut handler = StatefulHandler::new(Box::new(Outer::default()), Log::default());
        start(&mut handler, "root");
        start(&mut handler, "form");
        assert_eq!(handler.stack_len(), 3);
        assert_eq!(handler.current().map(|s| s.depth()), Some(1));
        start(&mut handler, "input");
        end(&mut handler, "input");
        end(&mut handler, "form");
        assert_eq!(handler.stack_len(), 1);
        handler.characters("after");
        end(&mut handler, "root");
        end(&mut handler, "stray");

        assert_eq!(
            handler.into_inner().0,
            vec!["<root>", "<form>", "<input>", "</input>", "</form>", "AFTER", "</root>"]
        );
    }

    #[test]
    fn test_delegation_chain_unwinds_together() {
        let mut handler = StatefulHandler::new(Box::new(Outer::default()), Log::default());
        start(&mut handler, "root");
        start(&mut handler, "relay");
        assert_eq!(handler.stack_len(), 3);
        start(&mut handler, "x");
        handler.characters("in");
        end(&mut handler, "x");
        assert_eq!(handler.stack_len(), 3);
        end(&mut handler, "relay");
        assert_eq!(handler.stack_len(), 1);
        handler.characters("out");
        end(&mut handler, "root");

        assert_eq!(
            handler.into_inner().0,
            vec!["<root>", "<relay>", "<x>", "in", "</x>", "</relay>", "OUT", "</root>"]
        );
    }
}
