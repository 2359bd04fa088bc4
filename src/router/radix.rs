//! Segment tree for route resolution.
//!
//! Each node is one path segment. Literal children are tried before the
//! placeholder child, and a failed branch backtracks, so at the first
//! segment where two templates differ the literal one wins:
//!
//! ```text
//! /event/active     GET  -> literal child "active"
//! /event/{event}    GET  -> placeholder child, int coercion
//! ```
//!
//! `GET /event/active` resolves to the first route, `GET /event/7` to the
//! second, and `GET /event/other` to neither: the placeholder's coercion
//! rejects it and nothing else is left to try.
//!
//! Placeholder nodes are anonymous. Names and types live on the route
//! descriptor, which coerces the captured segments when a terminal node is
//! reached. Lookup cost is proportional to the number of segments, not the
//! number of routes.

use http::Method;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::sync::Arc;

use crate::spec::{ParamVec, RouteDescriptor, Segment, MAX_INLINE_PARAMS};

#[derive(Clone, Debug, Default)]
struct RadixNode {
    literal: String,
    /// Routes terminating here, one per method.
    routes: SmallVec<[(Method, usize); 4]>,
    children: Vec<RadixNode>,
    placeholder: Option<Box<RadixNode>>,
}

impl RadixNode {
    fn literal(segment: &str) -> Self {
        Self {
            literal: segment.to_string(),
            ..Self::default()
        }
    }

    fn insert(&mut self, segments: &[Segment], method: &Method, route_idx: usize) {
        let Some((first, rest)) = segments.split_first() else {
            self.routes.push((method.clone(), route_idx));
            return;
        };

        match first {
            Segment::Capture(_) => self
                .placeholder
                .get_or_insert_with(Box::default)
                .insert(rest, method, route_idx),
            Segment::Literal(lit) => {
                if let Some(child) = self.children.iter_mut().find(|c| c.literal == *lit) {
                    child.insert(rest, method, route_idx);
                } else {
                    let mut child = RadixNode::literal(lit);
                    child.insert(rest, method, route_idx);
                    self.children.push(child);
                }
            }
        }
    }

    fn search<'a>(
        &self,
        segments: &'a [Cow<'_, str>],
        method: &Method,
        captured: &mut SmallVec<[&'a str; MAX_INLINE_PARAMS]>,
        routes: &[Arc<RouteDescriptor>],
    ) -> Option<(usize, ParamVec)> {
        let Some((first, rest)) = segments.split_first() else {
            let (_, idx) = self.routes.iter().find(|(m, _)| m == method)?;
            let bound = routes.get(*idx)?.bind_path(captured)?;
            return Some((*idx, bound));
        };

        for child in &self.children {
            if child.literal == **first {
                if let Some(found) = child.search(rest, method, captured, routes) {
                    return Some(found);
                }
            }
        }

        if let Some(placeholder) = &self.placeholder {
            captured.push(&**first);
            if let Some(found) = placeholder.search(rest, method, captured, routes) {
                return Some(found);
            }
            captured.pop();
        }

        None
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(RadixNode::count).sum::<usize>()
            + self.placeholder.as_ref().map_or(0, |p| p.count())
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RadixTree {
    root: RadixNode,
}

impl RadixTree {
    pub(crate) fn insert(&mut self, route: &RouteDescriptor, route_idx: usize) {
        for method in route.methods() {
            self.root.insert(route.segments(), method, route_idx);
        }
    }

    /// Find the route for `method` and the decoded `segments`, returning its
    /// index and the coerced path parameters.
    pub(crate) fn find(
        &self,
        method: &Method,
        segments: &[Cow<'_, str>],
        routes: &[Arc<RouteDescriptor>],
    ) -> Option<(usize, ParamVec)> {
        let mut captured = SmallVec::new();
        self.root.search(segments, method, &mut captured, routes)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.root.count()
    }
}
