//! Document repository behaviour against the in-memory document store

use firebase_facade::document::{DocumentErrorCode, DocumentStoreError, Fields, Filter};
use firebase_facade::{AppError, DocumentError, Facade, GenericError, InMemoryBackends, Settings};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct City {
    name: String,
    state: String,
    population: u64,
    tags: Vec<String>,
}

fn city(name: &str, state: &str, population: u64, tags: &[&str]) -> City {
    City {
        name: name.to_string(),
        state: state.to_string(),
        population,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn setup() -> (Facade, InMemoryBackends) {
    let backends = InMemoryBackends::new();
    let facade = Facade::new(backends.backends(), Settings::default());
    (facade, backends)
}

async fn seeded() -> (Facade, InMemoryBackends) {
    let (facade, backends) = setup();
    let documents = facade.documents();
    for (id, data) in [
        ("rec", city("Recife", "PE", 1_500_000, &["coast", "capital"])),
        ("olinda", city("Olinda", "PE", 390_000, &["coast"])),
        ("sp", city("São Paulo", "SP", 12_300_000, &["capital"])),
        ("campinas", city("Campinas", "SP", 1_200_000, &[])),
    ] {
        documents.add_document("cities", &data, Some(id)).await.unwrap();
    }
    (facade, backends)
}

#[tokio::test]
async fn test_add_and_get_document() {
    let (facade, _) = setup();
    let documents = facade.documents();
    let recife = city("Recife", "PE", 1_500_000, &["coast"]);

    let id = documents.add_document("cities", &recife, None).await.unwrap();
    assert_eq!(id.len(), 20);

    let stored: Option<City> = documents.get_document("cities", &id).await.unwrap();
    assert_eq!(stored, Some(recife));

    let missing: Option<City> = documents.get_document("cities", "nope").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_update_document_merges_fields() {
    let (facade, _) = seeded().await;
    let documents = facade.documents();

    let mut fields = Fields::new();
    fields.insert("population".to_string(), json!(1_600_000));
    documents.update_document("cities", "rec", fields).await.unwrap();

    let stored: City = documents.get_document("cities", "rec").await.unwrap().unwrap();
    assert_eq!(stored.population, 1_600_000);
    assert_eq!(stored.name, "Recife");
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let (facade, _) = setup();
    let result = facade
        .documents()
        .update_document("cities", "ghost", Fields::new())
        .await;
    assert_eq!(
        result,
        Err(AppError::DocumentStore(DocumentError::DocumentNotFound))
    );
}

#[tokio::test]
async fn test_delete_document() {
    let (facade, _) = seeded().await;
    let documents = facade.documents();
    documents.delete_document("cities", "olinda").await.unwrap();
    let gone: Option<City> = documents.get_document("cities", "olinda").await.unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_find_documents_without_filters_scans_collection() {
    let (facade, _) = seeded().await;
    let all: Vec<City> = facade.documents().find_documents("cities", &[]).await.unwrap();
    let mut names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["Campinas", "Olinda", "Recife", "São Paulo"]);
}

#[tokio::test]
async fn test_find_documents_ands_filters() {
    let (facade, _) = seeded().await;
    let filters = [
        Filter::equal_to("state", "PE"),
        Filter::greater_than("population", 1_000_000),
    ];
    let found: Vec<City> = facade.documents().find_documents("cities", &filters).await.unwrap();
    assert_eq!(found, vec![city("Recife", "PE", 1_500_000, &["coast", "capital"])]);
}

#[tokio::test]
async fn test_find_documents_list_operators() {
    let (facade, _) = seeded().await;
    let documents = facade.documents();

    let capitals: Vec<City> = documents
        .find_documents("cities", &[Filter::array_contains("tags", "capital")])
        .await
        .unwrap();
    assert_eq!(capitals.len(), 2);

    let not_pe: Vec<City> = documents
        .find_documents("cities", &[Filter::not_in("state", ["PE"])])
        .await
        .unwrap();
    assert!(not_pe.iter().all(|c| c.state == "SP"));
    assert_eq!(not_pe.len(), 2);

    let either: Vec<City> = documents
        .find_documents("cities", &[Filter::is_in("name", ["Olinda", "Campinas", "Natal"])])
        .await
        .unwrap();
    assert_eq!(either.len(), 2);
}

#[tokio::test]
async fn test_listen_to_document_tracks_changes() {
    let (facade, _) = setup();
    let documents = facade.documents();
    let mut updates = documents.listen_to_document::<City>("cities", "rec");
    assert_eq!(updates.next().await, Some(Ok(None)));

    let recife = city("Recife", "PE", 1_500_000, &[]);
    documents.add_document("cities", &recife, Some("rec")).await.unwrap();
    assert_eq!(updates.next().await, Some(Ok(Some(recife))));

    documents.delete_document("cities", "rec").await.unwrap();
    assert_eq!(updates.next().await, Some(Ok(None)));
}

#[tokio::test]
async fn test_listen_to_collection_redelivers_matching_set() {
    let (facade, _) = seeded().await;
    let documents = facade.documents();
    let mut sp = documents.listen_to_collection::<City>("cities", &[Filter::equal_to("state", "SP")]);
    assert_eq!(sp.next().await.unwrap().unwrap().len(), 2);

    documents
        .add_document("cities", &city("Santos", "SP", 430_000, &["coast"]), Some("santos"))
        .await
        .unwrap();
    assert_eq!(sp.next().await.unwrap().unwrap().len(), 3);
}

#[tokio::test]
async fn test_revoked_access_ends_subscription() {
    let (facade, backends) = seeded().await;
    let mut cities = facade.documents().listen_to_collection::<City>("cities", &[]);
    assert!(cities.next().await.unwrap().is_ok());

    backends.documents.revoke_access("cities");
    assert_eq!(
        cities.next().await,
        Some(Err(AppError::DocumentStore(DocumentError::PermissionDenied)))
    );
    assert_eq!(cities.next().await, None);
    assert_eq!(backends.documents.listener_count(), 0);
}

#[tokio::test]
async fn test_cancelled_document_listener_is_removed() {
    let (facade, backends) = seeded().await;
    let subscription = facade.documents().listen_to_document::<City>("cities", "rec");
    assert_eq!(backends.documents.listener_count(), 1);
    subscription.cancel();
    assert_eq!(backends.documents.listener_count(), 0);
}

#[tokio::test]
async fn test_store_failures_are_classified() {
    let (facade, backends) = setup();
    let documents = facade.documents();

    backends.documents.fail_next(DocumentStoreError::status(
        DocumentErrorCode::Aborted,
        "transaction contention",
    ));
    let aborted = documents
        .add_document("cities", &city("Natal", "RN", 890_000, &[]), None)
        .await;
    assert_eq!(aborted, Err(AppError::DocumentStore(DocumentError::Aborted)));

    backends
        .documents
        .fail_next(DocumentStoreError::Io("socket closed".to_string()));
    let offline: Result<Vec<City>, _> = documents.find_documents("cities", &[]).await;
    assert_eq!(offline, Err(AppError::Generic(GenericError::NetworkError)));
}

#[tokio::test]
async fn test_non_map_payload_is_rejected() {
    let (facade, _) = setup();
    let result = facade.documents().add_document("numbers", &42, None).await;
    assert_eq!(result, Err(AppError::Generic(GenericError::UnknownError)));
}
