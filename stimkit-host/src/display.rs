use std::cell::RefCell;
use stimkit_core::{Display, Element, HostError};

/// An element currently on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub element: Element,
    pub hidden: bool,
    pub classes: Vec<String>,
}

/// Every operation the surface received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Appended(Element),
    Hidden(String),
    ClassAdded { id: String, class: String },
    Cleared,
}

/// In-memory display surface.
#[derive(Debug, Default)]
pub struct Surface {
    nodes: RefCell<Vec<Node>>,
    history: RefCell<Vec<DisplayEvent>>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn find(&self, id: &str) -> Option<Node> {
        self.nodes
            .borrow()
            .iter()
            .find(|node| node.element.id() == Some(id))
            .cloned()
    }

    pub fn history(&self) -> Vec<DisplayEvent> {
        self.history.borrow().clone()
    }

    fn with_node(&self, id: &str, f: impl FnOnce(&mut Node)) {
        if let Some(node) = self
            .nodes
            .borrow_mut()
            .iter_mut()
            .find(|node| node.element.id() == Some(id))
        {
            f(node);
        }
    }
}

impl Display for Surface {
    fn append(&self, element: Element) -> Result<(), HostError> {
        self.history
            .borrow_mut()
            .push(DisplayEvent::Appended(element.clone()));
        self.nodes.borrow_mut().push(Node {
            element,
            hidden: false,
            classes: Vec::new(),
        });
        Ok(())
    }

    fn set_hidden(&self, id: &str) -> Result<(), HostError> {
        self.history
            .borrow_mut()
            .push(DisplayEvent::Hidden(id.to_owned()));
        self.with_node(id, |node| node.hidden = true);
        Ok(())
    }

    fn add_class(&self, id: &str, class: &str) -> Result<(), HostError> {
        self.history.borrow_mut().push(DisplayEvent::ClassAdded {
            id: id.to_owned(),
            class: class.to_owned(),
        });
        self.with_node(id, |node| {
            if !node.classes.iter().any(|c| c == class) {
                node.classes.push(class.to_owned());
            }
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), HostError> {
        self.history.borrow_mut().push(DisplayEvent::Cleared);
        self.nodes.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimkit_core::{STIMULUS_ELEMENT_ID, StimulusContent};

    fn stimulus() -> Element {
        Element::Stimulus {
            id: STIMULUS_ELEMENT_ID,
            content: StimulusContent::Image("cat.png".into()),
        }
    }

    #[test]
    fn styles_apply_to_the_identified_element() {
        let surface = Surface::new();
        surface.append(stimulus()).unwrap();
        surface.append(Element::Prompt("press".into())).unwrap();
        surface.add_class(STIMULUS_ELEMENT_ID, "responded").unwrap();
        surface.add_class(STIMULUS_ELEMENT_ID, "responded").unwrap();
        surface.set_hidden(STIMULUS_ELEMENT_ID).unwrap();

        let node = surface.find(STIMULUS_ELEMENT_ID).unwrap();
        assert!(node.hidden);
        assert_eq!(node.classes, vec!["responded"]);
        assert!(!surface.nodes()[1].hidden);
    }

    #[test]
    fn operations_on_missing_elements_are_recorded_but_harmless() {
        let surface = Surface::new();
        surface.set_hidden(STIMULUS_ELEMENT_ID).unwrap();
        assert!(surface.is_empty());
        assert_eq!(
            surface.history(),
            vec![DisplayEvent::Hidden(STIMULUS_ELEMENT_ID.into())]
        );
    }

    #[test]
    fn clear_removes_everything() {
        let surface = Surface::new();
        surface.append(stimulus()).unwrap();
        surface.clear().unwrap();
        assert!(surface.is_empty());
        assert_eq!(surface.history().last(), Some(&DisplayEvent::Cleared));
    }
}
