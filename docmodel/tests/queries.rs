use docmodel::{bson::Bson, memory::InMemoryStore, prelude::*};
use futures::TryStreamExt;
use std::collections::BTreeMap;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn person(registry: &Registry) -> Model {
    registry
        .register(
            ModelSchema::builder("Person")
                .field("name", Field::text())
                .field("age", Field::integer())
                .field("tags", Field::list().blank())
                .field("address", Field::map().blank()),
        )
        .unwrap()
}

async fn seeded(model: &Model) -> ModelStore<InMemoryStore> {
    let store = ModelStore::new(InMemoryStore::builder().build().await.unwrap());
    let people = store.objects(model).unwrap();

    for (id, name, age, city) in [
        ("p1", "Ann", 31, "Oslo"),
        ("p2", "Bob", 25, "Bergen"),
        ("p3", "Cid", 31, "Oslo"),
        ("p4", "Dee", 40, "Tromso"),
        ("p5", "Eve", 19, "Bergen"),
    ] {
        people
            .create(fields! {
                "id" => id,
                "name" => name,
                "age" => age,
                "tags" => vec![city.to_lowercase()],
                "address" => BTreeMap::from([("city".to_string(), city)]),
            })
            .await
            .unwrap();
    }

    store
}

fn ids(instances: &[Instance]) -> Vec<&str> {
    instances
        .iter()
        .filter_map(Instance::id)
        .collect()
}

#[tokio::test]
async fn filters_become_backend_clauses() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let queryset = people.filter(fields! { "age__gt" => 5 }).unwrap();
    assert_eq!(
        queryset.where_clauses()[0].as_tuple(),
        ("age", ">", &Bson::Int64(5))
    );

    let queryset = people.filter(fields! { "age" => 5 }).unwrap();
    assert_eq!(
        queryset.where_clauses()[0].as_tuple(),
        ("age", "==", &Bson::Int64(5))
    );

    assert!(matches!(
        people.filter(fields! { "id" => "p1" }),
        Err(DocumentStoreError::Configuration(_))
    ));
    assert!(matches!(
        people.filter(fields! { "height__gt" => 1 }),
        Err(DocumentStoreError::Configuration(_))
    ));
}

#[tokio::test]
async fn filter_calls_extend_each_other() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    let found = store
        .objects(&person)
        .unwrap()
        .filter(fields! { "age__gte" => 25 })
        .unwrap()
        .filter(fields! { "age__lt" => 40 })
        .unwrap()
        .fetch()
        .await
        .unwrap();

    assert_eq!(ids(&found), ["p1", "p2", "p3"]);
}

#[tokio::test]
async fn sub_fields_and_contains_reach_into_collections() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let in_oslo = people
        .filter(fields! { "address__city" => "Oslo" })
        .unwrap()
        .fetch()
        .await
        .unwrap();
    let tagged = people
        .filter(fields! { "tags__contains" => "bergen" })
        .unwrap()
        .fetch()
        .await
        .unwrap();

    assert_eq!(ids(&in_oslo), ["p1", "p3"]);
    assert_eq!(ids(&tagged), ["p2", "p5"]);
}

#[tokio::test]
async fn get_requires_exactly_one_match() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let err = people.get(fields! { "age" => 99 }).await.unwrap_err();
    assert!(err.is_not_found());

    let err = people.get(fields! { "age" => 31 }).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::MultipleResults(2, _)));

    let dee = people.get(fields! { "name" => "Dee" }).await.unwrap();
    assert_eq!(dee.id(), Some("p4"));
    assert_eq!(dee.get("age"), Some(&Value::Int(40)));
}

#[tokio::test]
async fn identifier_lookups_use_the_document_path() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let bob = people.get(fields! { "id" => "p2" }).await.unwrap();
    assert_eq!(bob.get("name"), Some(&Value::from("Bob")));

    assert!(people.get(fields! { "id" => "p9" }).await.unwrap_err().is_not_found());
    assert!(matches!(
        people.get(fields! { "id" => "p2", "age" => 25 }).await,
        Err(DocumentStoreError::Configuration(_))
    ));
    assert!(matches!(
        people.get_by_id("").await,
        Err(DocumentStoreError::Configuration(_))
    ));
}

#[tokio::test]
async fn order_by_composes_in_call_order() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let by_age_then_name = people
        .all()
        .order_by("-age")
        .unwrap()
        .order_by("-name")
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(ids(&by_age_then_name), ["p4", "p3", "p1", "p2", "p5"]);

    let youngest = people
        .all()
        .order_by("age")
        .unwrap()
        .limit(2)
        .fetch()
        .await
        .unwrap();
    assert_eq!(ids(&youngest), ["p5", "p2"]);

    assert!(people.all().order_by("id").is_err());
}

#[tokio::test]
async fn first_returns_the_leading_match() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;
    let people = store.objects(&person).unwrap();

    let oldest = people
        .all()
        .order_by("-age")
        .unwrap()
        .first()
        .await
        .unwrap();
    let nobody = people
        .filter(fields! { "age__gt" => 100 })
        .unwrap()
        .first()
        .await
        .unwrap();

    assert_eq!(oldest.and_then(|p| p.id().map(str::to_string)), Some("p4".to_string()));
    assert!(nobody.is_none());
}

#[tokio::test]
async fn streams_yield_materialized_instances() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    let streamed = store
        .objects(&person)
        .unwrap()
        .filter(fields! { "age__lte" => 25 })
        .unwrap()
        .stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(ids(&streamed), ["p2", "p5"]);
    assert!(streamed.iter().all(|p| p.model() == &person));
}

#[tokio::test]
async fn paginator_walks_pages_with_a_cursor() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    let pages = store
        .objects(&person)
        .unwrap()
        .all()
        .order_by("age")
        .unwrap()
        .paginate(2)
        .unwrap()
        .collect_pages()
        .await
        .unwrap();

    let pages = pages
        .iter()
        .map(|page| (page.number, ids(&page.items), page.has_next()))
        .collect::<Vec<_>>();
    assert_eq!(
        pages,
        [
            (1, vec!["p5", "p2"], true),
            (2, vec!["p1", "p3"], true),
            (3, vec!["p4"], false),
        ]
    );
}

#[tokio::test]
async fn paginator_stops_at_the_query_limit() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    let pages = store
        .objects(&person)
        .unwrap()
        .all()
        .order_by("age")
        .unwrap()
        .limit(3)
        .paginate(2)
        .unwrap()
        .collect_pages()
        .await
        .unwrap();

    let pages = pages
        .iter()
        .map(|page| (page.number, ids(&page.items), page.has_next()))
        .collect::<Vec<_>>();
    assert_eq!(
        pages,
        [(1, vec!["p5", "p2"], true), (2, vec!["p1"], false)]
    );
}

#[tokio::test]
async fn paginator_rejects_empty_pages() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    assert!(store.objects(&person).unwrap().paginate(0).is_err());
}

#[tokio::test]
async fn raw_collections_expose_the_backend_query_surface() {
    init();
    let registry = Registry::new();
    let person = person(&registry);
    let store = seeded(&person).await;

    let documents = store
        .collection(person.path())
        .where_("age", FieldOp::Gte, 31)
        .order_by("name", SortDirection::Desc)
        .get()
        .await
        .unwrap();

    let names = documents
        .iter()
        .map(|document| document.to_map().get_str("name").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, ["Dee", "Cid", "Ann"]);
    assert_eq!(documents[0].reference(), &person.path().document("p4"));
}
