#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{BASE_URL, BROKEN_IMAGE, Part, TestContext, json_body, multipart};
use crophealth_backend::storage::MAX_IMAGE_BYTES;
use crophealth_backend::treatments::NO_TREATMENT_TEXT;
use shared::{PREDICTION_FAILED, TreatmentLookupResponse, UploadResponse};

const LEAF: &[u8] = b"\x89PNG\r\n\x1a\nfake leaf pixels";

fn upload_request(parts: &[Part<'_>]) -> test::TestRequest {
    let (content_type, body) = multipart(parts);
    test::TestRequest::post()
        .uri("/upload")
        .insert_header(("content-type", content_type))
        .set_payload(body)
}

#[actix_web::test]
async fn liveness() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!test::read_body(resp).await.is_empty());
}

#[actix_web::test]
async fn upload_returns_results_in_order() {
    let ctx = TestContext::new();
    ctx.store.add_agrovet("Westlands Agro Supplies", -1.2650, 36.8030);
    let app = test_app!(ctx);

    let req = upload_request(&[
        Part::File { filename: "first.png", data: LEAF },
        Part::File { filename: "second.jpg", data: BROKEN_IMAGE },
        Part::File { filename: "third.jpeg", data: LEAF },
        Part::Text { name: "latitude", value: "-1.2864" },
        Part::Text { name: "longitude", value: "36.8172" },
    ])
    .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = test::read_body_json(resp).await;
    let names: Vec<&str> = body.results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, ["first.png", "second.jpg", "third.jpeg"]);
    assert_eq!(body.results[0].confidence, 87.0);
    assert_eq!(body.results[0].nearby_agrovets.len(), 1);
    assert_eq!(body.results[1].disease, PREDICTION_FAILED);
    assert_eq!(body.results[2].disease, "Common_Rust");
    assert_eq!(ctx.store.predictions().len(), 2);
}

#[actix_web::test]
async fn upload_without_files_is_bad_request() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let resp = test::call_service(
        &app,
        upload_request(&[Part::Text { name: "latitude", value: "-1.2864" }]).to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(&test::read_body(resp).await);
    assert_eq!(body["error"], "No files uploaded");
    assert!(ctx.store.predictions().is_empty());
}

#[actix_web::test]
async fn upload_with_empty_selection_is_bad_request() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = upload_request(&[Part::File { filename: "", data: b"" }]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(&test::read_body(resp).await);
    assert_eq!(body["error"], "No selected files");
}

#[actix_web::test]
async fn upload_with_only_disallowed_files_returns_empty_results() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let resp = test::call_service(
        &app,
        upload_request(&[Part::File { filename: "notes.gif", data: LEAF }]).to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = test::read_body_json(resp).await;
    assert!(body.results.is_empty());
    assert_eq!(ctx.classifier.calls(), 0);
}

#[actix_web::test]
async fn oversized_image_is_cut_off_and_reported() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    let huge = vec![0u8; MAX_IMAGE_BYTES + 64 * 1024];

    let req = upload_request(&[
        Part::File { filename: "huge.png", data: &huge },
        Part::File { filename: "leaf.png", data: LEAF },
    ])
    .to_request();
    let body: UploadResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.results[0].disease, PREDICTION_FAILED);
    assert!(body.results[0].error.as_deref().unwrap().contains("File too large"));
    assert_eq!(body.results[1].disease, "Common_Rust");
    assert_eq!(ctx.files.largest(), MAX_IMAGE_BYTES + 1);
    assert_eq!(ctx.classifier.calls(), 1);
}

#[actix_web::test]
async fn too_many_files_is_bad_request() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    let parts: Vec<Part<'_>> = (0..21)
        .map(|_| Part::File { filename: "leaf.png", data: LEAF })
        .collect();

    let resp = test::call_service(&app, upload_request(&parts).to_request()).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(&test::read_body(resp).await);
    assert!(body["error"].as_str().unwrap().starts_with("Too many files"));
    assert_eq!(ctx.classifier.calls(), 0);
}

#[actix_web::test]
async fn upload_with_invalid_coordinate_is_bad_request() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let resp = test::call_service(
        &app,
        upload_request(&[
            Part::File { filename: "leaf.png", data: LEAF },
            Part::Text { name: "latitude", value: "123.0" },
            Part::Text { name: "longitude", value: "36.8" },
        ])
        .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.classifier.calls(), 0);
}

#[actix_web::test]
async fn upload_with_partial_coordinate_skips_providers() {
    let ctx = TestContext::new();
    ctx.store.add_agrovet("Westlands Agro Supplies", -1.2650, 36.8030);
    let app = test_app!(ctx);

    let resp = test::call_service(
        &app,
        upload_request(&[
            Part::File { filename: "leaf.png", data: LEAF },
            Part::Text { name: "latitude", value: "-1.2864" },
        ])
        .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = test::read_body_json(resp).await;
    assert!(body.results[0].nearby_agrovets.is_empty());
}

#[actix_web::test]
async fn treatment_lookup_with_location() {
    let ctx = TestContext::new();
    ctx.store.add_agrovet("Westlands Agro Supplies", -1.2650, 36.8030);
    ctx.store.add_worker("Jane Wanjiru", &["crop rotation"], -1.2900, 36.8200);
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/utils/treatments/Gray_Leaf_Spot?latitude=-1.2864&longitude=36.8172")
        .to_request();
    let body: TreatmentLookupResponse = test::call_and_read_body_json(&app, req).await;

    assert!(body.treatment.contains("strobilurins"));
    assert_eq!(
        body.treatment_images,
        [format!("{}/static/treatments/Gray_Leaf_Spot_Fungicide.jpeg", BASE_URL)]
    );
    assert_eq!(body.agrovets.len(), 1);
    assert_eq!(body.extension_workers.len(), 1);
}

#[actix_web::test]
async fn treatment_lookup_for_unknown_disease_is_total() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/utils/treatments/Leaf_Curl")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: TreatmentLookupResponse = test::read_body_json(resp).await;
    assert_eq!(body.treatment, NO_TREATMENT_TEXT);
    assert!(body.treatment_images.is_empty());
    assert!(body.agrovets.is_empty());
    assert!(body.extension_workers.is_empty());
}
