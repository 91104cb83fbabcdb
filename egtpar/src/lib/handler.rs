use egtgrammar::{Grammar, PIdx};
use egtlex::InputBuffer;

use crate::{ParseEvent, ParseHandler, ParseItem, Parser};

type Action<'h, T> = Box<dyn Fn(&mut [ParseItem<T>], &InputBuffer<'_>) -> T + 'h>;

/// Dispatches reductions to actions registered per production. Shifted tokens get no payload:
/// actions read the lexemes they need from the handles. A production without an action passes on
/// the payload of its first handle, so chains of unit productions need no actions at all. The
/// payload of the accepted item becomes the result.
pub struct ProductionHandler<'h, T> {
    actions: Vec<Option<Action<'h, T>>>,
    result: Option<T>,
}

impl<'h, T> ProductionHandler<'h, T> {
    pub fn new(grm: &Grammar) -> Self {
        ProductionHandler {
            actions: (0..grm.prods_len()).map(|_| None).collect(),
            result: None,
        }
    }

    /// Run `f` whenever the production with the ID `prod_id` (e.g. `<E> ::= <E> + <M>`) is
    /// reduced. Returns false if `grm` has no such production.
    pub fn set_action<F>(&mut self, grm: &Grammar, prod_id: &str, f: F) -> bool
    where
        F: Fn(&mut [ParseItem<T>], &InputBuffer<'_>) -> T + 'h,
    {
        match grm.prod_idx(prod_id) {
            Some(pidx) => {
                self.set_action_idx(pidx, f);
                true
            }
            None => false,
        }
    }

    pub fn set_action_idx<F>(&mut self, pidx: PIdx, f: F)
    where
        F: Fn(&mut [ParseItem<T>], &InputBuffer<'_>) -> T + 'h,
    {
        let i = usize::from(pidx);
        if i >= self.actions.len() {
            self.actions.resize_with(i + 1, || None);
        }
        self.actions[i] = Some(Box::new(f));
    }

    /// The payload of the accepted item, if the input has been accepted.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }
}

impl<T> ParseHandler<T> for ProductionHandler<'_, T> {
    fn on_event(&mut self, event: ParseEvent, psr: &mut Parser<'_, '_, T>) {
        match event {
            ParseEvent::Reduce => {
                if let Some(r) = psr.reduction_mut() {
                    let payload = match self.actions.get(usize::from(r.production)) {
                        Some(Some(f)) => Some(f(r.handles, r.input)),
                        _ => r.handles.first_mut().and_then(|h| h.payload.take()),
                    };
                    r.head.payload = payload;
                }
            }
            ParseEvent::Accept => {
                self.result = psr.top_mut().and_then(|t| t.payload.take());
            }
            _ => (),
        }
    }
}
