use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single entity record (student, enquiry, payment, ...).
///
/// Only the string `id` is interpreted; every other field is carried through
/// unchanged, in its original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// The six entity collections of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Students,
    Enquiries,
    Payments,
    Courses,
    Batches,
    Schemes,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Students,
        Collection::Enquiries,
        Collection::Payments,
        Collection::Courses,
        Collection::Batches,
        Collection::Schemes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Enquiries => "enquiries",
            Collection::Payments => "payments",
            Collection::Courses => "courses",
            Collection::Batches => "batches",
            Collection::Schemes => "schemes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A full snapshot of the data store, moved as one unit.
///
/// Collections absent from a serialized snapshot decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub students: Vec<Record>,
    pub enquiries: Vec<Record>,
    pub payments: Vec<Record>,
    pub courses: Vec<Record>,
    pub batches: Vec<Record>,
    pub schemes: Vec<Record>,
}

impl Dataset {
    pub fn collection(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Students => &self.students,
            Collection::Enquiries => &self.enquiries,
            Collection::Payments => &self.payments,
            Collection::Courses => &self.courses,
            Collection::Batches => &self.batches,
            Collection::Schemes => &self.schemes,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Students => &mut self.students,
            Collection::Enquiries => &mut self.enquiries,
            Collection::Payments => &mut self.payments,
            Collection::Courses => &mut self.courses,
            Collection::Batches => &mut self.batches,
            Collection::Schemes => &mut self.schemes,
        }
    }

    /// Record counts per collection, in canonical order.
    pub fn counts(&self) -> impl Iterator<Item = (Collection, usize)> + '_ {
        Collection::ALL
            .into_iter()
            .map(|c| (c, self.collection(c).len()))
    }

    /// Total number of records across all collections
    pub fn len(&self) -> usize {
        self.counts().map(|(_, n)| n).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
