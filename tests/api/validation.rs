use clinic_manager::models::staff::StaffRole;

use crate::helpers::spawn_app;

#[tokio::test]
async fn malformed_json_uses_error_envelope() {
    let app = spawn_app().await;
    let token = app.token_for(StaffRole::Owner, None);

    let response = app
        .api_client
        .post(app.url("/clinics"))
        .bearer_auth(token)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn blank_clinic_name_is_rejected() {
    let app = spawn_app().await;
    let token = app.token_for(StaffRole::Owner, None);

    let response = app
        .api_client
        .post(app.url("/clinics"))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": "" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
