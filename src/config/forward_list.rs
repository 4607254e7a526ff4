use std::fmt;

use serde::{
    Deserialize,
    de::{self, SeqAccess, Visitor},
};

/// An ordered set of forwarding specs.
///
/// Values may be supplied several times and each value may itself be a comma
/// separated list. Every spec is kept once, in the order it was first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ForwardList(Vec<String>);

impl ForwardList {
    pub fn new() -> Self {
        ForwardList(Vec::new())
    }
    /// splits `raw` on commas and keeps the tokens that are not stored yet
    pub fn append(&mut self, raw: &str) {
        for token in raw.split(',') {
            if !self.0.iter().any(|existing| existing == token) {
                self.0.push(token.to_string());
            }
        }
    }
    pub fn render(&self) -> String {
        self.0.join(",")
    }
    pub fn clear(&mut self) {
        self.0.clear();
    }
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ForwardList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for ForwardList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ForwardListVisitor;
        impl<'de> Visitor<'de> for ForwardListVisitor {
            type Value = ForwardList;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a list of forwarding specs or a comma separated string")
            }
            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let mut list = ForwardList::new();
                list.append(value);
                Ok(list)
            }
            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                // a bare port, as in `dynamic_forward: 1080`
                self.visit_str(&value.to_string())
            }
            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                // `local_forward:` with nothing after it
                Ok(ForwardList::new())
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut list = ForwardList::new();
                while let Some(spec) = seq.next_element::<String>()? {
                    list.append(&spec);
                }
                Ok(list)
            }
        }
        deserializer.deserialize_any(ForwardListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &ForwardList) -> Vec<&str> {
        list.iter().collect()
    }

    #[test]
    fn append_keeps_first_occurrence_order() {
        let mut list = ForwardList::new();
        list.append("a,b,a");
        list.append("b,c");
        assert_eq!(collect(&list), vec!["a", "b", "c"]);
    }

    #[test]
    fn append_single_call_with_duplicates() {
        let mut list = ForwardList::new();
        list.append("a,b,a,c");
        assert_eq!(collect(&list), vec!["a", "b", "c"]);
        list.append("c,d");
        assert_eq!(collect(&list), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn append_sequences_keep_unique_first_seen_order() {
        let cases: &[&[&str]] = &[
            &["a,b,a", "b,c"],
            &["x", "x", "x,x"],
            &["1:a:1,2:b:2", "3:c:3,1:a:1", "2:b:2,4:d:4,3:c:3"],
            &["c,b,a", "a,b,c,d", "d"],
            &["p,q", "", "q,,r"],
            &["A,a", "a,A,b,B"],
        ];
        for calls in cases {
            let mut list = ForwardList::new();
            for raw in calls.iter() {
                list.append(raw);
            }

            let mut seen = std::collections::HashSet::new();
            let expected: Vec<&str> = calls
                .iter()
                .flat_map(|raw| raw.split(','))
                .filter(|token| seen.insert(*token))
                .collect();

            let stored = collect(&list);
            assert_eq!(stored, expected, "appending {calls:?}");
            let unique: std::collections::HashSet<_> = stored.iter().collect();
            assert_eq!(unique.len(), stored.len(), "duplicates after {calls:?}");
        }
    }

    #[test]
    fn append_is_case_sensitive() {
        let mut list = ForwardList::new();
        list.append("host:80");
        list.append("HOST:80,host:80");
        assert_eq!(collect(&list), vec!["host:80", "HOST:80"]);
    }

    #[test]
    fn render_splits_back_into_the_same_list() {
        let mut list = ForwardList::new();
        list.append("8080:localhost:80,9090:localhost:90");
        list.append("8080:localhost:80");
        list.append("1080");
        let rendered = list.render();
        assert_eq!(rendered, "8080:localhost:80,9090:localhost:90,1080");
        assert_eq!(rendered.split(',').collect::<Vec<_>>(), collect(&list));
        assert_eq!(list.to_string(), rendered);
    }

    #[test]
    fn render_of_empty_list_is_empty() {
        assert_eq!(ForwardList::new().render(), "");
        assert!(ForwardList::default().is_empty());
    }

    #[test]
    fn clear_then_append_replaces_content() {
        let mut list = ForwardList::new();
        list.append("a,b");
        list.clear();
        list.append("c");
        assert_eq!(collect(&list), vec!["c"]);
    }

    #[test]
    fn deserialize_sequence_and_string() {
        let from_seq: ForwardList = serde_yaml::from_str("[\"a\", \"b\", \"a\"]").unwrap();
        assert_eq!(collect(&from_seq), vec!["a", "b"]);
        let from_str: ForwardList = serde_yaml::from_str("a,b,c,b").unwrap();
        assert_eq!(collect(&from_str), vec!["a", "b", "c"]);
        let from_null: ForwardList = serde_yaml::from_str("~").unwrap();
        assert!(from_null.is_empty());
        let from_port: ForwardList = serde_yaml::from_str("1080").unwrap();
        assert_eq!(collect(&from_port), vec!["1080"]);
    }

    #[test]
    fn deserialize_rejects_mappings() {
        let parsed: Result<ForwardList, serde_yaml::Error> = serde_yaml::from_str("a: b");
        assert!(parsed.is_err());
    }
}
