use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;

use appointments::{
    change_appointment_status, create_appointment, delete_appointment, get_appointment,
    get_appointments, get_available_slots, update_appointment,
};
use bills::{
    cancel_bill, create_bill, get_bill, get_bill_receipts, get_bills, get_receipt,
    get_transactions, record_payment,
};
use clinics::{
    create_clinic, delete_clinic, get_clinic, get_current_clinic, get_my_clinics, update_clinic,
};
use medicines::{
    create_medicine, deduct_stock, delete_medicine, get_expiring_batches, get_low_stock,
    get_medicine, get_medicine_batches, get_medicine_stock, get_medicines, receive_stock,
    update_medicine,
};
use notifications::{
    create_notification, get_notifications, get_unread_count, mark_all_read, mark_read,
};
use patients::{
    create_patient, delete_patient, get_patient, get_patient_prescriptions,
    get_patient_treatment_history, search_patients, update_patient,
};
use prescriptions::{
    cancel_prescription, create_prescription, dispense_prescription, get_prescription,
};
use queue::{
    call_next, cancel_entry, check_in, complete_entry, get_position, get_queue, skip_entry,
};
use staff::{
    create_staff, deactivate_staff, delete_staff, get_staff, get_staff_member, update_staff,
};
use subscriptions::{
    cancel_subscription, check_usage, get_current_subscription, get_package, get_packages,
    get_subscription_history, process_expired, renew_subscription, set_auto_renew, subscribe,
    upgrade_subscription,
};
use treatment_history::{
    create_treatment_history, get_treatment_history, update_treatment_history,
};

mod appointments;
mod bills;
mod clinics;
mod health_check;
mod medicines;
mod notifications;
mod patients;
mod prescriptions;
mod queue;
mod staff;
mod subscriptions;
mod treatment_history;

use crate::routes::health_check::*;

// Literal segments are registered ahead of `/{id}` matchers in each scope.

fn clinics_routes() -> Scope {
    scope("clinics")
        .service(create_clinic)
        .service(get_my_clinics)
        .service(get_current_clinic)
        .service(get_clinic)
        .service(update_clinic)
        .service(delete_clinic)
}

fn staff_routes() -> Scope {
    scope("staff")
        .service(create_staff)
        .service(get_staff)
        .service(get_staff_member)
        .service(update_staff)
        .service(deactivate_staff)
        .service(delete_staff)
}

fn patients_routes() -> Scope {
    scope("patients")
        .service(create_patient)
        .service(search_patients)
        .service(get_patient)
        .service(update_patient)
        .service(delete_patient)
        .service(get_patient_treatment_history)
        .service(get_patient_prescriptions)
}

fn appointments_routes() -> Scope {
    scope("appointments")
        .service(create_appointment)
        .service(get_appointments)
        .service(get_available_slots)
        .service(get_appointment)
        .service(update_appointment)
        .service(change_appointment_status)
        .service(delete_appointment)
}

fn treatment_history_routes() -> Scope {
    scope("treatment-history")
        .service(create_treatment_history)
        .service(get_treatment_history)
        .service(update_treatment_history)
}

fn medicines_routes() -> Scope {
    scope("medicines")
        .service(create_medicine)
        .service(get_medicines)
        .service(get_medicine)
        .service(update_medicine)
        .service(delete_medicine)
        .service(get_medicine_batches)
        .service(get_medicine_stock)
}

fn inventory_routes() -> Scope {
    scope("inventory")
        .service(receive_stock)
        .service(deduct_stock)
        .service(get_low_stock)
        .service(get_expiring_batches)
}

fn prescriptions_routes() -> Scope {
    scope("prescriptions")
        .service(create_prescription)
        .service(get_prescription)
        .service(dispense_prescription)
        .service(cancel_prescription)
}

fn bills_routes() -> Scope {
    scope("bills")
        .service(create_bill)
        .service(get_bills)
        .service(get_bill)
        .service(record_payment)
        .service(cancel_bill)
        .service(get_bill_receipts)
}

fn transactions_routes() -> Scope {
    scope("transactions").service(get_transactions)
}

fn receipts_routes() -> Scope {
    scope("receipts").service(get_receipt)
}

fn queue_routes() -> Scope {
    scope("queue")
        .service(check_in)
        .service(get_queue)
        .service(call_next)
        .service(get_position)
        .service(complete_entry)
        .service(skip_entry)
        .service(cancel_entry)
}

fn notifications_routes() -> Scope {
    scope("notifications")
        .service(create_notification)
        .service(get_notifications)
        .service(get_unread_count)
        .service(mark_all_read)
        .service(mark_read)
}

fn subscription_routes() -> Scope {
    scope("subscription")
        .service(get_packages)
        .service(get_package)
        .service(subscribe)
        .service(upgrade_subscription)
        .service(cancel_subscription)
        .service(renew_subscription)
        .service(set_auto_renew)
        .service(get_current_subscription)
        .service(get_subscription_history)
        .service(check_usage)
        .service(process_expired)
}

pub fn clinic_routes(conf: &mut ServiceConfig) {
    conf.service(
        scope("api")
            .service(health_check)
            .service(clinics_routes())
            .service(staff_routes())
            .service(patients_routes())
            .service(appointments_routes())
            .service(treatment_history_routes())
            .service(medicines_routes())
            .service(inventory_routes())
            .service(prescriptions_routes())
            .service(bills_routes())
            .service(transactions_routes())
            .service(receipts_routes())
            .service(queue_routes())
            .service(notifications_routes())
            .service(subscription_routes()),
    );
}
