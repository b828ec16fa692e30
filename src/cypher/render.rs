use std::borrow::Cow;
use std::fmt;

use crate::client::Parameters;
use crate::value::{Properties, Value};

use super::ast::{Clause, CypherQuery, NodePattern, Pattern, PatternDirection, Predicate, RelationshipPattern};

/// Rendered statement: query text plus the parameters it references.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    text: String,
    parameters: Parameters,
}

impl Statement {
    /// Query text.
    pub fn query_string(&self) -> &str {
        &self.text
    }

    /// Parameters referenced by the text as `$p0`, `$p1`, ...
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Splits into text and parameters.
    pub fn into_parts(self) -> (String, Parameters) {
        (self.text, self.parameters)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Back-quotes `name` unless it is a plain identifier.
pub fn escape_identifier(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}

/// `alias.key` with the key escaped.
pub fn property_ref(alias: &str, key: &str) -> String {
    format!("{alias}.{}", escape_identifier(key))
}

/// Renders a pattern that carries no inline properties, e.g. for a list
/// comprehension in a RETURN item.
pub fn pattern_text(pattern: &Pattern) -> String {
    let mut renderer = Renderer::default();
    let text = renderer.pattern(pattern);
    debug_assert!(renderer.parameters.is_empty(), "pattern text cannot carry parameters");
    text
}

pub(crate) fn render(query: &CypherQuery) -> Statement {
    let mut renderer = Renderer::default();
    let text = query
        .clauses()
        .iter()
        .map(|clause| renderer.clause(clause))
        .collect::<Vec<_>>()
        .join(" ");
    Statement {
        text,
        parameters: renderer.parameters,
    }
}

#[derive(Default)]
struct Renderer {
    parameters: Parameters,
}

impl Renderer {
    fn bind(&mut self, value: &Value) -> String {
        let name = format!("p{}", self.parameters.len());
        let placeholder = format!("${name}");
        self.parameters.insert(name, value.clone());
        placeholder
    }

    fn clause(&mut self, clause: &Clause) -> String {
        match clause {
            Clause::Match(patterns) => format!("MATCH {}", self.patterns(patterns)),
            Clause::Where(predicate) => format!("WHERE {}", self.predicate(predicate)),
            Clause::Create(patterns) => format!("CREATE {}", self.patterns(patterns)),
            Clause::Set(items) => {
                let assignments: Vec<String> = items
                    .iter()
                    .map(|item| {
                        let target = property_ref(&item.alias, &item.key);
                        format!("{target} = {}", self.bind(&item.value))
                    })
                    .collect();
                format!("SET {}", assignments.join(", "))
            }
            Clause::Delete { items, detach } => {
                let keyword = if *detach { "DETACH DELETE" } else { "DELETE" };
                format!("{keyword} {}", items.join(", "))
            }
            Clause::Return(items) => format!("RETURN {}", items.join(", ")),
            Clause::Skip(n) => format!("SKIP {n}"),
            Clause::Limit(n) => format!("LIMIT {n}"),
        }
    }

    fn patterns(&mut self, patterns: &[Pattern]) -> String {
        patterns
            .iter()
            .map(|pattern| self.pattern(pattern))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn pattern(&mut self, pattern: &Pattern) -> String {
        match pattern {
            Pattern::Node(node) => self.node(node),
            Pattern::Relationship(rel) => self.relationship(rel),
        }
    }

    fn node(&mut self, node: &NodePattern) -> String {
        let mut head = node.alias.clone().unwrap_or_default();
        for label in &node.labels {
            head.push(':');
            head.push_str(&escape_identifier(label));
        }
        format!("({})", self.with_properties(head, &node.properties))
    }

    fn relationship(&mut self, rel: &RelationshipPattern) -> String {
        let left = self.node(&rel.left);
        let mut head = rel.alias.clone().unwrap_or_default();
        if !rel.types.is_empty() {
            let types: Vec<Cow<'_, str>> =
                rel.types.iter().map(|t| escape_identifier(t)).collect();
            head.push(':');
            head.push_str(&types.join("|"));
        }
        let body = self.with_properties(head, &rel.properties);
        let right = self.node(&rel.right);
        match rel.direction {
            PatternDirection::LeftToRight => format!("{left}-[{body}]->{right}"),
            PatternDirection::RightToLeft => format!("{left}<-[{body}]-{right}"),
            PatternDirection::Undirected => format!("{left}-[{body}]-{right}"),
        }
    }

    fn with_properties(&mut self, head: String, properties: &Properties) -> String {
        if properties.is_empty() {
            return head;
        }
        let entries: Vec<String> = properties
            .iter()
            .map(|(key, value)| format!("{}: {}", escape_identifier(key), self.bind(value)))
            .collect();
        let map = format!("{{{}}}", entries.join(", "));
        if head.is_empty() {
            map
        } else {
            format!("{head} {map}")
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Comparison {
                lhs,
                operator,
                value,
            } => {
                if operator.is_unary() {
                    format!("{lhs} {operator}")
                } else {
                    format!("{lhs} {operator} {}", self.bind(value))
                }
            }
            Predicate::And(children) => self.junction(children, " AND ", "true"),
            Predicate::Or(children) => self.junction(children, " OR ", "false"),
            Predicate::Not(inner) => format!("NOT ({})", self.predicate(inner)),
        }
    }

    fn junction(&mut self, children: &[Predicate], separator: &str, empty: &str) -> String {
        match children {
            [] => empty.to_owned(),
            [only] => self.predicate(only),
            _ => {
                let parts: Vec<String> = children.iter().map(|c| self.predicate(c)).collect();
                format!("({})", parts.join(separator))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::ast::{Operator, SetItem};
    use crate::props;

    fn cmp(lhs: &str, operator: Operator, value: impl Into<Value>) -> Predicate {
        Predicate::Comparison {
            lhs: lhs.to_owned(),
            operator,
            value: value.into(),
        }
    }

    #[test]
    fn renders_match_where_return() {
        let mut query = CypherQuery::new();
        query
            .add_clause(Clause::Match(vec![NodePattern::new("node")
                .with_label("Person")
                .with_properties(props! { "name" => "Ada" })
                .into()]))
            .add_clause(Clause::Where(Predicate::And(vec![
                cmp("node.age", Operator::GreaterThan, 30),
                cmp("node.email", Operator::IsNotNull, Value::Null),
            ])))
            .add_clause(Clause::Return(vec!["node".into()]))
            .add_clause(Clause::Skip(5))
            .add_clause(Clause::Limit(10));

        let statement = query.render();
        assert_eq!(
            statement.query_string(),
            "MATCH (node:Person {name: $p0}) WHERE (node.age > $p1 AND node.email IS NOT NULL) \
             RETURN node SKIP 5 LIMIT 10"
        );
        assert_eq!(
            statement.parameters(),
            &props! { "p0" => "Ada", "p1" => 30 }
        );
    }

    #[test]
    fn renders_relationship_directions() {
        let mut rel = RelationshipPattern {
            alias: Some("rel".into()),
            types: vec!["KNOWS".into()],
            properties: props! { "since" => 2001 },
            left: NodePattern::new("left").with_label("Person"),
            right: NodePattern::new("right"),
            direction: PatternDirection::LeftToRight,
        };
        let text = |rel: &RelationshipPattern| {
            let mut query = CypherQuery::new();
            query.add_clause(Clause::Match(vec![rel.clone().into()]));
            query.render().query_string().to_owned()
        };
        assert_eq!(
            text(&rel),
            "MATCH (left:Person)-[rel:KNOWS {since: $p0}]->(right)"
        );
        rel.direction = PatternDirection::RightToLeft;
        assert_eq!(
            text(&rel),
            "MATCH (left:Person)<-[rel:KNOWS {since: $p0}]-(right)"
        );
        rel.direction = PatternDirection::Undirected;
        rel.types.push("LIKES".into());
        rel.properties.clear();
        assert_eq!(text(&rel), "MATCH (left:Person)-[rel:KNOWS|LIKES]-(right)");
    }

    #[test]
    fn renders_empty_junctions_and_negation() {
        let mut query = CypherQuery::new();
        query.add_clause(Clause::Where(Predicate::Or(vec![
            Predicate::And(vec![]),
            Predicate::Not(Box::new(cmp("id(node)", Operator::Equals, 7))),
            Predicate::Or(vec![]),
        ])));
        assert_eq!(
            query.render().query_string(),
            "WHERE (true OR NOT (id(node) = $p0) OR false)"
        );
    }

    #[test]
    fn renders_set_and_delete() {
        let mut query = CypherQuery::new();
        query
            .add_clause(Clause::Set(vec![SetItem {
                alias: "rel".into(),
                key: "first name".into(),
                value: "Ada".into(),
            }]))
            .add_clause(Clause::Delete {
                items: vec!["rel".into()],
                detach: true,
            });
        assert_eq!(
            query.render().query_string(),
            "SET rel.`first name` = $p0 DETACH DELETE rel"
        );
    }

    #[test]
    fn escapes_identifiers() {
        assert_eq!(escape_identifier("name"), "name");
        assert_eq!(escape_identifier("_x1"), "_x1");
        assert_eq!(escape_identifier("1x"), "`1x`");
        assert_eq!(escape_identifier("we`ird"), "`we``ird`");
        assert_eq!(escape_identifier(""), "``");
    }

    #[test]
    fn pattern_text_for_comprehensions() {
        let pattern: Pattern = RelationshipPattern {
            alias: None,
            types: vec!["WROTE".into()],
            left: NodePattern::new("node"),
            right: NodePattern::new("related").with_label("Post"),
            ..RelationshipPattern::default()
        }
        .into();
        assert_eq!(pattern_text(&pattern), "(node)-[:WROTE]->(related:Post)");
    }
}
