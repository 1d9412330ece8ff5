use crate::domain::condition::ValueTransform;

/// One permitted condition title, together with the short flag and help
/// text used to register it as a terminal option.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub title: &'static str,
    pub flag: char,
    pub description: &'static str,
    pub transform: Option<ValueTransform>,
}

/// Whitelist of condition titles the range parser accepts.
///
/// Built once at process start and passed by reference into the parser and
/// the CLI option builder; never mutated afterwards.
#[derive(Debug)]
pub struct ConditionRegistry {
    entries: Vec<RegistryEntry>,
}

impl ConditionRegistry {
    /// The fixed set of catalog columns that may carry a range condition.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                RegistryEntry {
                    title: "SvnRev",
                    flag: 'r',
                    description: "Revision of the software that produced the file",
                    transform: None,
                },
                RegistryEntry {
                    title: "version",
                    flag: 'v',
                    description: "Version of the production software",
                    transform: None,
                },
                RegistryEntry {
                    title: "energy",
                    flag: 'e',
                    description: "Energy range (MeV)",
                    transform: None,
                },
                RegistryEntry {
                    title: "last-modified",
                    flag: 'l',
                    description: "Time of last modification (YYYYMMDD-YYYYMMDD)",
                    transform: Some(ValueTransform::DateTime),
                },
                RegistryEntry {
                    title: "timestamp",
                    flag: 't',
                    description: "Timestamp range of recorded events",
                    transform: None,
                },
                RegistryEntry {
                    title: "size",
                    flag: 's',
                    description: "Size range of a file (MB)",
                    transform: Some(ValueTransform::MebibytesToBytes),
                },
                RegistryEntry {
                    title: "nevts",
                    flag: 'n',
                    description: "Number of events per file",
                    transform: None,
                },
            ],
        }
    }

    pub fn is_allowed(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    pub fn get(&self, title: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.title == title)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }
}
