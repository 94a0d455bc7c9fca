//! PriorityOrderer - total order over the units of one queue
//!
//! - FIFO: submission time ascending, then name
//! - Priority: effective priority descending, then the FIFO rule
//!
//! Effective priority is the numeric `priority` when set, otherwise the
//! resolved `priorityClassName`, otherwise `DEFAULT_PRIORITY`. Numeric
//! priority wins when both are set.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::application::service::constants::DEFAULT_PRIORITY;
use crate::domain::{Queue, QueuePolicy, QueueUnit};
use crate::port::{NoPriorityClasses, PriorityClassResolver};

/// Compares units of one queue under its policy. Stateless apart from the resolver.
#[derive(Clone)]
pub struct PriorityOrderer {
    resolver: Arc<dyn PriorityClassResolver>,
}

impl Default for PriorityOrderer {
    fn default() -> Self {
        Self::new(Arc::new(NoPriorityClasses))
    }
}

impl PriorityOrderer {
    pub fn new(resolver: Arc<dyn PriorityClassResolver>) -> Self {
        Self { resolver }
    }

    /// `Less` means `a` is scheduled first. `Equal` only for the same name.
    pub fn compare(&self, policy: QueuePolicy, a: &QueueUnit, b: &QueueUnit) -> Ordering {
        match policy {
            QueuePolicy::Fifo => fifo(a, b),
            QueuePolicy::Priority => self
                .unit_priority(b)
                .cmp(&self.unit_priority(a))
                .then_with(|| fifo(a, b)),
        }
    }

    pub fn unit_priority(&self, unit: &QueueUnit) -> i32 {
        self.effective(unit.spec.priority, unit.spec.priority_class_name.as_deref())
    }

    pub fn queue_priority(&self, queue: &Queue) -> i32 {
        self.effective(queue.spec.priority, queue.spec.priority_class_name.as_deref())
    }

    fn effective(&self, priority: Option<i32>, class_name: Option<&str>) -> i32 {
        if let Some(p) = priority {
            return p;
        }
        class_name
            .filter(|name| !name.is_empty())
            .and_then(|name| self.resolver.resolve(name))
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Sort units in scheduling order
    pub fn sort(&self, policy: QueuePolicy, units: &mut [&QueueUnit]) {
        units.sort_by(|a, b| self.compare(policy, a, b));
    }
}

fn fifo(a: &QueueUnit, b: &QueueUnit) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceList;
    use std::collections::HashMap;

    struct Classes(HashMap<String, i32>);

    impl PriorityClassResolver for Classes {
        fn resolve(&self, class_name: &str) -> Option<i32> {
            self.0.get(class_name).copied()
        }
    }

    fn unit(name: &str, created_at: i64) -> QueueUnit {
        QueueUnit::new(name, created_at, "q1", ResourceList::new())
    }

    #[test]
    fn test_fifo_orders_by_creation_then_name() {
        let orderer = PriorityOrderer::default();
        let early = unit("zeta", 100);
        let late = unit("alpha", 200);
        let tie = unit("beta", 100);

        assert_eq!(orderer.compare(QueuePolicy::Fifo, &early, &late), Ordering::Less);
        assert_eq!(orderer.compare(QueuePolicy::Fifo, &tie, &early), Ordering::Less);
        assert_eq!(orderer.compare(QueuePolicy::Fifo, &early, &early), Ordering::Equal);
    }

    #[test]
    fn test_fifo_ignores_priority() {
        let orderer = PriorityOrderer::default();
        let early = unit("a", 100);
        let urgent = unit("b", 200).with_priority(100);
        assert_eq!(orderer.compare(QueuePolicy::Fifo, &early, &urgent), Ordering::Less);
    }

    #[test]
    fn test_priority_higher_first_with_fifo_tiebreak() {
        let orderer = PriorityOrderer::default();
        let low = unit("low", 100).with_priority(1);
        let high = unit("high", 200).with_priority(10);
        let high_early = unit("high-early", 50).with_priority(10);

        assert_eq!(orderer.compare(QueuePolicy::Priority, &high, &low), Ordering::Less);
        assert_eq!(
            orderer.compare(QueuePolicy::Priority, &high_early, &high),
            Ordering::Less
        );
    }

    #[test]
    fn test_priority_class_resolution_and_numeric_precedence() {
        let classes = Classes(HashMap::from([("critical".to_string(), 1000)]));
        let orderer = PriorityOrderer::new(Arc::new(classes));

        let by_class = unit("a", 100).with_priority_class("critical");
        let both = unit("b", 100).with_priority(5).with_priority_class("critical");
        let unknown = unit("c", 100).with_priority_class("missing");

        assert_eq!(orderer.unit_priority(&by_class), 1000);
        assert_eq!(orderer.unit_priority(&both), 5);
        assert_eq!(orderer.unit_priority(&unknown), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_without_resolver_classes_are_default() {
        let orderer = PriorityOrderer::default();
        let classed = unit("a", 100).with_priority_class("critical");
        assert_eq!(orderer.unit_priority(&classed), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let orderer = PriorityOrderer::default();
        let units = [
            unit("c", 300).with_priority(1),
            unit("a", 100),
            unit("b", 100).with_priority(1),
            unit("d", 50),
        ];
        let mut refs: Vec<&QueueUnit> = units.iter().collect();
        orderer.sort(QueuePolicy::Priority, &mut refs);
        let names: Vec<&str> = refs.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "d", "a"]);
    }
}
