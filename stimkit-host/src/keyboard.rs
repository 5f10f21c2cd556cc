use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use stimkit_core::{
    HostError, Key, KeyChoice, ListenerId, ResponseCallback, ResponseInfo, ResponseSource,
};
use stimkit_timing::Timer;
use tracing::trace;

struct Listener {
    choices: KeyChoice,
    callback: ResponseCallback,
    since_ns: u64,
}

/// Keyboard dispatcher. Listeners are one-shot: a listener is removed
/// before its callback runs, and reaction time is measured from `listen`.
pub struct Keyboard<T: Timer<Timestamp = u64>> {
    timer: T,
    listeners: RefCell<BTreeMap<ListenerId, Listener>>,
    next_id: Cell<u64>,
}

impl<T: Timer<Timestamp = u64>> Keyboard<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            listeners: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers a key press to every listener that accepts it, in
    /// registration order. Returns how many listeners were triggered.
    pub fn press(&self, key: &Key) -> Result<usize, HostError> {
        let matching: Vec<ListenerId> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, listener)| listener.choices.accepts(key))
            .map(|(id, _)| *id)
            .collect();

        let mut delivered = 0;
        for id in matching {
            // An earlier callback may have cancelled this one.
            let Some(mut listener) = self.listeners.borrow_mut().remove(&id) else {
                continue;
            };
            let rt = self.timer.elapsed(listener.since_ns);
            trace!(listener = id.0, %key, rt_ms = rt.as_millis(), "key delivered");
            (listener.callback)(ResponseInfo {
                key: key.clone(),
                rt,
            })?;
            delivered += 1;
        }
        if delivered == 0 {
            trace!(%key, "key ignored");
        }
        Ok(delivered)
    }
}

impl<T: Timer<Timestamp = u64>> ResponseSource for Keyboard<T> {
    fn listen(&self, choices: &KeyChoice, on_response: ResponseCallback) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().insert(
            id,
            Listener {
                choices: choices.clone(),
                callback: on_response,
                since_ns: self.timer.now(),
            },
        );
        id
    }

    fn cancel(&self, id: ListenerId) {
        if self.listeners.borrow_mut().remove(&id).is_some() {
            trace!(listener = id.0, "listener cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::time::Duration;
    use stimkit_timing::VirtualTimer;

    fn capture(log: &Rc<RefCell<Vec<ResponseInfo>>>) -> ResponseCallback {
        let log = Rc::clone(log);
        Box::new(move |info: ResponseInfo| {
            log.borrow_mut().push(info);
            Ok(())
        })
    }

    #[test]
    fn reaction_time_is_measured_from_listen() {
        let timer = VirtualTimer::new();
        let keyboard = Keyboard::new(timer.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        timer.advance(Duration::from_millis(100));
        keyboard.listen(&KeyChoice::from_keys(["f"]), capture(&log));
        timer.advance(Duration::from_millis(420));

        assert_eq!(keyboard.press(&Key::new("f")).unwrap(), 1);
        assert_eq!(log.borrow()[0].rt, Duration::from_millis(420));
    }

    #[test]
    fn listeners_fire_once_and_only_for_accepted_keys() {
        let keyboard = Keyboard::new(VirtualTimer::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        keyboard.listen(&KeyChoice::from_keys(["f", "j"]), capture(&log));

        assert_eq!(keyboard.press(&Key::new("x")).unwrap(), 0);
        assert_eq!(keyboard.press(&Key::new("j")).unwrap(), 1);
        assert_eq!(keyboard.press(&Key::new("j")).unwrap(), 0);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(keyboard.active_listeners(), 0);
    }

    #[test]
    fn cancelled_listener_is_not_called() {
        let keyboard = Keyboard::new(VirtualTimer::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = keyboard.listen(&KeyChoice::Any, capture(&log));
        keyboard.cancel(id);
        keyboard.cancel(id);

        assert_eq!(keyboard.press(&Key::new("space")).unwrap(), 0);
        assert!(log.borrow().is_empty());
    }
}
