mod common;

use std::sync::{Arc, OnceLock};

use common::{count, init_tracing, node, relationship, row};
use grm::client::{Record, ScriptedClient};
use grm::prelude::*;
use grm::{props, Connections, Entity, GrmError, Result};

/// Every model in this file runs on its own connection so tests can share
/// the process-wide resolver while running in parallel.
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

struct Author(Entity);
grm::impl_model!(Author {
    const CONNECTION: Option<&'static str> = Some("authors");
});
impl NodeModel for Author {}

struct Book(Entity);
grm::impl_model!(Book {
    const CONNECTION: Option<&'static str> = Some("books");
    const FIELDS: Option<&'static [&'static str]> = Some(&["title", "year"]);
});
impl NodeModel for Book {}

struct Genre(Entity);
grm::impl_model!(Genre {
    const LABEL: Option<&'static str> = Some("Category");
    const CONNECTION: Option<&'static str> = Some("genres");
});
impl NodeModel for Genre {}

struct Draft(Entity);
grm::impl_model!(Draft {
    const CONNECTION: Option<&'static str> = Some("drafts");
});
impl NodeModel for Draft {}

struct Wrote(Entity);
grm::impl_model!(Wrote {
    const LABEL: Option<&'static str> = Some("WROTE");
    const CONNECTION: Option<&'static str> = Some("wrote");
});
impl RelationshipModel for Wrote {}

struct Likes(Entity);
grm::impl_model!(Likes {
    const LABEL: Option<&'static str> = Some("LIKES");
    const CONNECTION: Option<&'static str> = Some("likes");
});
impl RelationshipModel for Likes {}

fn persisted<M: Model>(id: i64) -> M {
    M::from_entity(Entity::from_parts(Some(id), [M::label()], props! {}))
}

#[test]
fn create_then_get_by_id() -> Result<()> {
    let client = attach("authors");
    let stored = node(1, &["Author"], [("name", "Ursula".into())]);
    client
        .respond(vec![row("node", stored.clone())])
        .respond(vec![row("node", stored)]);

    let created = Author::create(props! { "name" => "Ursula" })?;
    let id = created.id().expect("created nodes carry an id");
    let found: Vec<Author> = Author::get(id, None, None, None)?.collect::<Result<_>>()?;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].property("name"), Some(&Value::from("Ursula")));
    let statements: Vec<_> = client.executed().into_iter().map(|s| s.statement).collect();
    assert_eq!(
        statements,
        [
            "CREATE (node:Author {name: $p0}) RETURN node",
            "MATCH (node:Author) WHERE id(node) = $p0 RETURN node",
        ]
    );
    Ok(())
}

#[test]
fn declared_fields_gate_creation() -> Result<()> {
    let client = attach("books");

    let err = Book::create(props! { "title" => "Dune", "isbn" => "0441013597" })
        .err()
        .expect("undeclared field");
    assert_eq!(err.code(), "InvalidArgument");
    let err = Book::insert(vec![props! { "title" => "Emma" }, props! { "pages" => 474 }])
        .err()
        .expect("undeclared field");
    assert_eq!(err.code(), "InvalidArgument");
    assert!(client.executed().is_empty());

    client.respond(vec![Record::new([
        ("node0", node(5, &["Book"], [("title", "Emma".into())])),
        ("node1", node(6, &["Book"], [("title", "Dune".into())])),
    ])]);
    let books = Book::insert(vec![
        props! { "title" => "Emma" },
        props! { "title" => "Dune" },
    ])?;
    let ids: Vec<_> = books.iter().map(Model::id).collect();
    assert_eq!(ids, [Some(5), Some(6)]);
    Ok(())
}

#[test]
fn first_or_create_reuses_or_creates() -> Result<()> {
    let client = attach("genres");
    let existing = node(3, &["Category"], [("name", "Poetry".into())]);
    let fresh = node(4, &["Category"], [("name", "Essays".into())]);
    client
        .respond(vec![row("node", existing)])
        .respond(vec![])
        .respond(vec![row("node", fresh)]);

    let poetry = Genre::first_or_create(props! { "name" => "Poetry" })?;
    assert_eq!(poetry.id(), Some(3));
    assert_eq!(client.executed().len(), 1);

    let essays = Genre::first_or_create(props! { "name" => "Essays" })?;
    assert_eq!(essays.id(), Some(4));

    let statements: Vec<_> = client.executed().into_iter().map(|s| s.statement).collect();
    assert_eq!(
        statements,
        [
            "MATCH (node:Category) WHERE node.name = $p0 RETURN node LIMIT 1",
            "MATCH (node:Category) WHERE node.name = $p0 RETURN node LIMIT 1",
            "CREATE (node:Category {name: $p0}) RETURN node",
        ]
    );
    Ok(())
}

#[test]
fn count_and_delete_by_lookup() -> Result<()> {
    let client = attach("drafts");
    client
        .respond(vec![count(4)])
        .respond(vec![count(1)])
        .respond(vec![count(2)]);

    assert_eq!(Draft::count(Lookup::all().with("stale", true))?, 4);
    assert_eq!(Draft::delete(12_i64)?, 1);
    assert_eq!(Draft::detach_delete(props! { "stale" => true })?, 2);

    let statements: Vec<_> = client.executed().into_iter().map(|s| s.statement).collect();
    assert_eq!(
        statements,
        [
            "MATCH (node:Draft) WHERE node.stale = $p0 RETURN count(node) AS count",
            "MATCH (node:Draft) WHERE id(node) = $p0 DELETE node RETURN count(node) AS count",
            "MATCH (node:Draft) WHERE node.stale = $p0 DETACH DELETE node \
             RETURN count(node) AS count",
        ]
    );
    Ok(())
}

#[test]
fn relationship_between_persisted_models() -> Result<()> {
    let client = attach("wrote");
    client.respond(vec![row(
        "rel",
        relationship(30, "WROTE", (1, 5), [("year", 1969_i64.into())]),
    )]);
    let author: Author = persisted(1);
    let book: Book = persisted(5);

    let wrote = Wrote::create(
        Endpoint::node(&author)?,
        Endpoint::node(&book)?,
        props! { "year" => 1969 },
        true,
    )?;

    assert_eq!(wrote.id(), Some(30));
    assert_eq!(wrote.entity().endpoints(), Some((1, 5)));
    assert_eq!(
        client.last().expect("statement ran").statement,
        "MATCH (left:Author), (right:Book) WHERE (id(left) = $p0 AND id(right) = $p1) \
         CREATE (left)-[rel:WROTE {year: $p2}]->(right) RETURN rel"
    );

    let draft = Draft::from_entity(Entity::new(props! { "title" => "untitled" })?);
    let err = Endpoint::node(&draft).unwrap_err();
    assert!(matches!(err, GrmError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn relationship_lookup_and_first_or_create() -> Result<()> {
    let client = attach("likes");
    client
        .respond(vec![count(2)])
        .respond(vec![])
        .respond(vec![row("rel", relationship(50, "LIKES", (8, 9), []))]);

    let reader = Endpoint::configure(|node| {
        node.label("Reader").r#where("handle", "ged");
    });
    assert_eq!(Likes::count(EdgeLookup::all().left(reader))?, 2);

    let like = Likes::first_or_create(Endpoint::id(8), Endpoint::id(9), props! {}, true)?;
    assert_eq!(like.id(), Some(50));

    let statements: Vec<_> = client.executed().into_iter().map(|s| s.statement).collect();
    assert_eq!(
        statements,
        [
            "MATCH (left:Reader)-[rel:LIKES]->(right) WHERE left.handle = $p0 \
             RETURN count(rel) AS count",
            "MATCH (left)-[rel:LIKES]->(right) WHERE (id(left) = $p0 AND id(right) = $p1) \
             RETURN rel LIMIT 1",
            "MATCH (left), (right) WHERE (id(left) = $p0 AND id(right) = $p1) \
             CREATE (left)-[rel:LIKES]->(right) RETURN rel",
        ]
    );
    Ok(())
}

#[test]
fn unknown_connection_is_a_configuration_error() {
    attach("registered-elsewhere");

    struct Orphan(Entity);
    grm::impl_model!(Orphan {
        const CONNECTION: Option<&'static str> = Some("never-registered");
    });
    impl NodeModel for Orphan {}

    let err = Orphan::count(Lookup::all()).unwrap_err();
    assert_eq!(err.code(), "Configuration");
    assert!(err.to_string().contains("never-registered"));
}
