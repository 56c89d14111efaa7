//! Boundary states that sit below the real work of a rewrite.

use super::{State, Transition};
use crate::sax::{Attributes, ContentHandler};

/// Bottom state for a whole document.
///
/// Outside the root element, text, ignorable whitespace, CDATA and
/// comments are dropped. Processing instructions, document start/end and
/// prefix mappings pass through. A root element is handed to the next
/// state when one is set; otherwise this state forwards everything itself.
///
/// The next state comes back through [`State::on_return`] when the root
/// closes, so a second top-level element reuses it.
#[derive(Default)]
pub struct DocumentRootState {
    depth: usize,
    next: Option<Box<dyn State>>,
}

impl DocumentRootState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_next_state(next: Box<dyn State>) -> Self {
        Self {
            depth: 0,
            next: Some(next),
        }
    }

    pub fn set_next_state(&mut self, next: Box<dyn State>) {
        self.next = Some(next);
    }

    fn outside_root(&self) -> bool {
        self.depth == 0
    }
}

impl State for DocumentRootState {
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
        if self.outside_root() {
            if let Some(next) = self.next.take() {
                return Transition::Delegate(next);
            }
        }
        out.start_element(uri, local_name, qname, attributes);
        Transition::Stay
    }

    fn on_return(&mut self, _out: &mut dyn ContentHandler, finished: Box<dyn State>) {
        if self.next.is_none() {
            self.next = Some(finished);
        }
    }

    fn characters(&mut self, out: &mut dyn ContentHandler, text: &str) {
        if !self.outside_root() {
            out.characters(text);
        }
    }

    fn ignorable_whitespace(&mut self, out: &mut dyn ContentHandler, text: &str) {
        if !self.outside_root() {
            out.ignorable_whitespace(text);
        }
    }

    fn cdata(&mut self, out: &mut dyn ContentHandler, text: &str) {
        if !self.outside_root() {
            out.cdata(text);
        }
    }

    fn comment(&mut self, out: &mut dyn ContentHandler, text: &str) {
        if !self.outside_root() {
            out.comment(text);
        }
    }
}

/// Bottom state for a stream of sibling elements with no document around
/// them.
///
/// Behaves like [`DocumentRootState`] and also drops document start/end
/// and processing instructions outside any element.
#[derive(Default)]
pub struct FragmentRootState {
    inner: DocumentRootState,
}

impl FragmentRootState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_next_state(next: Box<dyn State>) -> Self {
        Self {
            inner: DocumentRootState::with_next_state(next),
        }
    }

    pub fn set_next_state(&mut self, next: Box<dyn State>) {
        self.inner.set_next_state(next);
    }
}

impl State for FragmentRootState {
    fn depth(&self) -> usize {
        self.inner.depth
    }

    fn depth_mut(&mut self) -> &mut usize {
        &mut self.inner.depth
    }

    fn start_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        self.inner
            .start_element_start(out, uri, local_name, qname, attributes)
    }

    fn on_return(&mut self, out: &mut dyn ContentHandler, finished: Box<dyn State>) {
        self.inner.on_return(out, finished);
    }

    fn start_document(&mut self, _out: &mut dyn ContentHandler) {}

    fn end_document(&mut self, _out: &mut dyn ContentHandler) {}

    fn characters(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.inner.characters(out, text);
    }

    fn ignorable_whitespace(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.inner.ignorable_whitespace(out, text);
    }

    fn cdata(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.inner.cdata(out, text);
    }

    fn processing_instruction(&mut self, out: &mut dyn ContentHandler, target: &str, data: &str) {
        if !self.inner.outside_root() {
            out.processing_instruction(target, data);
        }
    }

    fn comment(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.inner.comment(out, text);
    }
}
