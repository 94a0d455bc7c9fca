// Static PriorityClassResolver backed by configuration

use admit_core::port::PriorityClassResolver;
use std::collections::HashMap;

/// Priority classes known up front (name -> value)
#[derive(Debug, Clone, Default)]
pub struct StaticPriorityClassResolver {
    classes: HashMap<String, i32>,
}

impl StaticPriorityClassResolver {
    pub fn new(classes: HashMap<String, i32>) -> Self {
        Self { classes }
    }

    pub fn with(mut self, name: impl Into<String>, value: i32) -> Self {
        self.classes.insert(name.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl PriorityClassResolver for StaticPriorityClassResolver {
    fn resolve(&self, class_name: &str) -> Option<i32> {
        self.classes.get(class_name).copied()
    }
}
