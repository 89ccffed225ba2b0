use docmodel::{memory::InMemoryStore, path, prelude::*};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Fixture {
    user: Model,
    order: Model,
    line: Model,
    store: ModelStore<InMemoryStore>,
}

async fn fixture() -> Fixture {
    init();
    let registry = Registry::new();
    let user = registry
        .register(
            ModelSchema::builder("User")
                .collection_name("users")
                .field("name", Field::text()),
        )
        .unwrap();
    let order = registry
        .register(
            ModelSchema::builder("Order")
                .collection_name("orders")
                .field("total", Field::integer()),
        )
        .unwrap();
    let line = registry
        .register(ModelSchema::builder("OrderLine").field("sku", Field::text()))
        .unwrap();

    Fixture {
        user,
        order,
        line,
        store: ModelStore::new(InMemoryStore::new()),
    }
}

fn collection(segments: &[&str]) -> CollectionPath {
    CollectionPath::new(segments.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
async fn unsaved_parents_cannot_host_sub_collections() {
    let f = fixture().await;
    let unsaved = f.user.new_instance(fields! { "name" => "Ann" }).unwrap();

    let unsaved_path = path::model_path(&unsaved);
    assert_eq!(unsaved_path.id, None);
    assert_eq!(unsaved_path.concrete_len() % 2, 1);

    assert!(matches!(
        f.order.set_base_path(&unsaved),
        Err(DocumentStoreError::Configuration(_))
    ));
    assert!(f.store.objects(&f.order).unwrap().under(&unsaved).is_err());
    assert_eq!(f.order.path(), collection(&["orders"]));
}

#[tokio::test]
async fn set_base_path_rebinds_the_model_until_reset() {
    let f = fixture().await;
    let ann = f
        .store
        .objects(&f.user)
        .unwrap()
        .create(fields! { "id" => "X", "name" => "Ann" })
        .await
        .unwrap();

    f.order.set_base_path(&ann).unwrap();
    assert_eq!(f.order.path(), collection(&["users", "X", "orders"]));

    let order = f
        .store
        .objects(&f.order)
        .unwrap()
        .create(fields! { "total" => 12 })
        .await
        .unwrap();
    assert_eq!(
        order.document_path().unwrap().to_string(),
        format!("users/X/orders/{}", order.id().unwrap())
    );

    f.order.reset_base_path();
    assert_eq!(f.order.path(), collection(&["orders"]));
    assert!(f.store.objects(&f.order).unwrap().all().fetch().await.unwrap().is_empty());
}

#[tokio::test]
async fn scoped_base_paths_restore_on_drop() {
    let f = fixture().await;
    let users = f.store.objects(&f.user).unwrap();
    let ann = users
        .create(fields! { "id" => "ann", "name" => "Ann" })
        .await
        .unwrap();
    let bob = users
        .create(fields! { "id" => "bob", "name" => "Bob" })
        .await
        .unwrap();

    {
        let _outer = f.order.scoped_base_path(&ann).unwrap();
        {
            let _inner = f.order.scoped_base_path(&bob).unwrap();
            assert_eq!(f.order.path(), collection(&["users", "bob", "orders"]));
        }
        assert_eq!(f.order.path(), collection(&["users", "ann", "orders"]));

        f.store
            .objects(&f.order)
            .unwrap()
            .create(fields! { "total" => 5 })
            .await
            .unwrap();
    }

    assert_eq!(f.order.path(), collection(&["orders"]));
    assert_eq!(
        f.store
            .backend()
            .len(&collection(&["users", "ann", "orders"]))
            .await,
        1
    );
}

#[tokio::test]
async fn managers_can_be_scoped_without_touching_the_model() {
    let f = fixture().await;
    let ann = f
        .store
        .objects(&f.user)
        .unwrap()
        .create(fields! { "id" => "ann", "name" => "Ann" })
        .await
        .unwrap();
    let orders = f.store.objects(&f.order).unwrap().under(&ann).unwrap();

    let mut order = orders
        .create(fields! { "id" => "o1", "total" => 30 })
        .await
        .unwrap();
    assert_eq!(f.order.path(), collection(&["orders"]));
    assert_eq!(orders.collection_path(), collection(&["users", "ann", "orders"]));

    let loaded = orders.get_by_id("o1").await.unwrap();
    assert_eq!(loaded.collection_path(), collection(&["users", "ann", "orders"]));
    assert!(
        f.store
            .objects(&f.order)
            .unwrap()
            .get_by_id("o1")
            .await
            .unwrap_err()
            .is_not_found()
    );

    // Instances remember where they were saved, so the unscoped manager writes them back there.
    order.set("total", 31).unwrap();
    f.store
        .objects(&f.order)
        .unwrap()
        .save(&mut order)
        .await
        .unwrap();
    assert_eq!(
        orders.get_by_id("o1").await.unwrap().get("total"),
        Some(&Value::Int(31))
    );
}

#[tokio::test]
async fn sub_collections_nest_to_any_depth() {
    let f = fixture().await;
    let ann = f
        .store
        .objects(&f.user)
        .unwrap()
        .create(fields! { "id" => "ann", "name" => "Ann" })
        .await
        .unwrap();
    let order = f
        .store
        .objects(&f.order)
        .unwrap()
        .under(&ann)
        .unwrap()
        .create(fields! { "id" => "o1", "total" => 2 })
        .await
        .unwrap();

    let lines = f.store.objects(&f.line).unwrap().under(&order).unwrap();
    lines.create(fields! { "sku" => "A-1" }).await.unwrap();

    assert_eq!(
        lines.collection_path(),
        collection(&["users", "ann", "orders", "o1", "order_line"])
    );
    assert_eq!(lines.all().fetch().await.unwrap().len(), 1);
}
