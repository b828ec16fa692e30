mod common;

use std::sync::{Arc, OnceLock};

use common::{init_tracing, node};
use grm::client::{CypherValue, Record, ScriptedClient};
use grm::prelude::*;
use grm::{props, Connections, Entity, GrmError, Result};

fn attach(connection: &str) -> Arc<ScriptedClient> {
    static CONNECTIONS: OnceLock<Connections> = OnceLock::new();
    init_tracing();
    let connections = CONNECTIONS.get_or_init(|| {
        let connections = Connections::new();
        connections.install();
        connections
    });
    let client = Arc::new(ScriptedClient::new());
    connections.register(connection, client.clone());
    client
}

struct Book(Entity);
grm::impl_model!(Book);

struct Agent(Entity);
grm::impl_model!(Agent);

/// Writer model bound to its own connection, one per test.
macro_rules! writer {
    ($name:ident, $connection:literal) => {
        struct $name(Entity);
        grm::impl_model!($name {
            const LABEL: Option<&'static str> = Some("Writer");
            const CONNECTION: Option<&'static str> = Some($connection);
        });
        impl NodeModel for $name {
            fn relations() -> RelationSchema {
                RelationSchema::new()
                    .with("books", Relation::to::<Book>("WROTE"))
                    .with(
                        "agent",
                        Relation::to::<Agent>("REPRESENTS")
                            .with_direction(Direction::Incoming)
                            .single(),
                    )
                    .with(
                        "peers",
                        Relation::new("KNOWS", "Writer").with_direction(Direction::Both),
                    )
            }
        }
    };
}

fn persisted<M: Model>(id: i64) -> M {
    M::from_entity(Entity::from_parts(Some(id), ["Writer"], props! {}))
}

fn books<const N: usize>(ids: [i64; N]) -> CypherValue {
    CypherValue::list(
        ids.map(|id| node(id, &["Book"], [("title", format!("book {id}").into())])),
    )
}

#[test]
fn several_relations_load_in_one_statement() -> Result<()> {
    writer!(Le, "relations-batch");
    let client = attach("relations-batch");
    client.respond(vec![Record::new([
        ("books", books([2, 3])),
        ("agent", CypherValue::list([node(9, &["Agent"], [])])),
    ])]);
    let mut writer: Le = persisted(1);

    writer.load(&["books", "agent", "books"])?;
    let titles: Vec<_> = writer
        .related_many::<Book>("books")?
        .iter()
        .map(|book| book.property("title").and_then(Value::as_str).map(str::to_owned))
        .collect();
    let agent = writer.related_one::<Agent>("agent")?;

    assert_eq!(
        titles,
        [Some("book 2".to_owned()), Some("book 3".to_owned())]
    );
    assert_eq!(agent.and_then(|agent| agent.id()), Some(9));
    let executed = client.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].statement,
        "MATCH (node:Writer) WHERE id(node) = $p0 \
         RETURN [(node)-[:WROTE]->(related:Book) | related] AS books, \
         [(node)<-[:REPRESENTS]-(related:Agent) | related] AS agent"
    );
    assert_eq!(executed[0].parameters, props! { "p0" => 1 });
    Ok(())
}

#[test]
fn cached_relations_are_not_queried_again() -> Result<()> {
    writer!(Ursula, "relations-cache");
    let client = attach("relations-cache");
    client
        .respond(vec![Record::new([("books", books([4]))])])
        .respond(vec![Record::new([("peers", CypherValue::list([node(
            7,
            &["Writer"],
            [],
        )]))])]);
    let mut writer: Ursula = persisted(1);

    assert_eq!(writer.related("books")?.len(), 1);
    assert_eq!(writer.related("books")?.len(), 1);
    writer.load(&["books", "peers"])?;
    assert_eq!(writer.related("peers")?.nodes()[0].id(), Some(7));

    let statements: Vec<_> = client.executed().into_iter().map(|s| s.statement).collect();
    assert_eq!(
        statements,
        [
            "MATCH (node:Writer) WHERE id(node) = $p0 \
             RETURN [(node)-[:WROTE]->(related:Book) | related] AS books",
            "MATCH (node:Writer) WHERE id(node) = $p0 \
             RETURN [(node)-[:KNOWS]-(related:Writer) | related] AS peers",
        ]
    );
    Ok(())
}

#[test]
fn reload_replaces_the_cache() -> Result<()> {
    writer!(Octavia, "relations-reload");
    let client = attach("relations-reload");
    client
        .respond(vec![Record::new([("books", books([2]))])])
        .respond(vec![Record::new([("books", books([2, 5]))])]);
    let mut writer: Octavia = persisted(1);

    writer.load(&["books"])?;
    assert_eq!(writer.related("books")?.len(), 1);
    writer.reload(&["books"])?;
    let ids: Vec<_> = writer.related("books")?.nodes().iter().map(Model::id).collect();

    assert_eq!(ids, [Some(2), Some(5)]);
    assert_eq!(client.executed().len(), 2);
    Ok(())
}

#[test]
fn absent_single_relation_is_none() -> Result<()> {
    writer!(Iain, "relations-absent");
    let client = attach("relations-absent");
    client.respond(vec![Record::new([
        ("agent", CypherValue::list(Vec::<CypherValue>::new())),
        ("books", CypherValue::Null),
    ])]);
    let mut writer: Iain = persisted(1);

    writer.load(&["agent", "books"])?;

    assert!(writer.related_one::<Agent>("agent")?.is_none());
    assert!(writer.related_many::<Book>("books")?.is_empty());
    assert_eq!(writer.related("agent")?, &Related::One(None));
    Ok(())
}

#[test]
fn undeclared_and_unpersisted_are_rejected() -> Result<()> {
    writer!(Nnedi, "relations-errors");
    let client = attach("relations-errors");

    let mut saved: Nnedi = persisted(1);
    let err = saved.load(&["books", "awards"]).err().expect("awards is undeclared");
    assert!(matches!(
        &err,
        GrmError::MissingRelation { relation, label } if relation == "awards" && label == "Writer"
    ));
    assert!(saved.related("awards").is_err());

    let mut draft = Nnedi::from_entity(Entity::new(props! { "name" => "Nnedi" })?);
    let err = draft.related("books").err().expect("draft has no id");
    assert_eq!(err.code(), "InvalidArgument");

    assert!(client.executed().is_empty());
    Ok(())
}

#[test]
fn multiplicity_must_match_the_accessor() -> Result<()> {
    writer!(Samuel, "relations-multiplicity");
    let client = attach("relations-multiplicity");
    client.respond(vec![Record::new([
        ("books", books([3])),
        ("agent", CypherValue::Null),
    ])]);
    let mut writer: Samuel = persisted(1);
    writer.load(&["books", "agent"])?;

    assert!(writer.related_one::<Book>("books").is_err());
    assert!(writer.related_many::<Agent>("agent").is_err());
    assert_eq!(client.executed().len(), 1);
    Ok(())
}

#[test]
fn relations_stay_out_of_the_json_view() -> Result<()> {
    writer!(Becky, "relations-json");
    let client = attach("relations-json");
    client.respond(vec![Record::new([("books", books([2]))])]);
    let mut writer = Becky::from_entity(Entity::from_parts(
        Some(1),
        ["Writer"],
        props! { "name" => "Becky" },
    ));

    writer.load(&["books"])?;

    assert_eq!(
        writer.entity().to_json()?,
        serde_json::json!({ "name": "Becky" })
    );
    Ok(())
}
