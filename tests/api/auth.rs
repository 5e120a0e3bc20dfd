use clinic_manager::models::staff::StaffRole;
use uuid::Uuid;

use crate::helpers::spawn_app;

#[tokio::test]
async fn tenant_routes_reject_missing_token() {
    let app = spawn_app().await;

    for path in ["/patients", "/appointments", "/bills", "/queue", "/notifications"] {
        let response = app
            .api_client
            .get(app.url(path))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16(), "GET {} without token", path);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let app = spawn_app().await;
    let token = format!("{}x", app.token_for(StaffRole::Owner, None));

    let response = app
        .api_client
        .get(app.url("/clinics"))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn only_owners_can_create_clinics() {
    let app = spawn_app().await;
    let token = app.token_for(StaffRole::Receptionist, Some(Uuid::new_v4()));

    let response = app
        .api_client
        .post(app.url("/clinics"))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": "Northside Clinic" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(403, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn doctors_cannot_create_staff() {
    let app = spawn_app().await;
    let token = app.token_for(StaffRole::Doctor, Some(Uuid::new_v4()));

    let response = app
        .api_client
        .post(app.url("/staff"))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "full_name": "Ada Obi",
            "email": "ada@clinic.test",
            "role": "Nurse"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn owner_clinic_header_must_be_a_uuid() {
    let app = spawn_app().await;
    let token = app.token_for(StaffRole::Owner, None);

    let response = app
        .api_client
        .get(app.url("/patients"))
        .bearer_auth(token)
        .header("X-Clinic-Id", "not-a-uuid")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
