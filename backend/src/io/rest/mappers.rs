//! DTO-to-command mappers. The REST DTOs in `shared` are the public wire
//! contract; the command structs are internal to the domain layer. Mapping
//! is kept here so handlers stay declarative.

use crate::domain::commands::members::{CreateMemberCommand, PayDueCommand, UpdateMemberCommand};
use crate::domain::commands::receipts::{CreateReceiptCommand, UpdateReceiptCommand};
use shared::{
    CreateMemberRequest, CreateReceiptRequest, PayDueRequest, UpdateMemberRequest,
    UpdateReceiptRequest,
};

pub fn to_create_member_command(request: CreateMemberRequest) -> CreateMemberCommand {
    CreateMemberCommand {
        name: request.name,
        phone: request.phone,
        email: request.email,
        member_number: request.member_number,
        registration_fee: request.registration_fee.unwrap_or(0.0),
        package_fee: request.package_fee,
        discount: request.discount.unwrap_or(0.0),
        // On the wire the registration payment arrives as `paid_amount`
        initial_payment: request.paid_amount.unwrap_or(0.0),
        payment_method: request.payment_method,
        subscription_start: request.subscription_start,
        subscription_end: request.subscription_end,
        plan_type: request.plan_type,
    }
}

pub fn to_update_member_command(request: UpdateMemberRequest) -> UpdateMemberCommand {
    UpdateMemberCommand {
        name: request.name,
        phone: request.phone,
        email: request.email,
        member_number: request.member_number,
        registration_fee: request.registration_fee,
        package_fee: request.package_fee,
        discount: request.discount,
        paid_amount: request.paid_amount,
        subscription_start: request.subscription_start,
        subscription_end: request.subscription_end,
        plan_type: request.plan_type,
        status: request.status,
    }
}

pub fn to_create_receipt_command(request: CreateReceiptRequest) -> CreateReceiptCommand {
    CreateReceiptCommand {
        member_id: request.member_id,
        payer_name: request.payer_name,
        amount: request.amount,
        amount_paid: request.amount_paid,
        due_amount: request.due_amount,
        payment_method: request.payment_method,
        description: request.description,
        receipt_category: request.receipt_category,
        is_initial: request.is_initial.unwrap_or(false),
    }
}

pub fn to_update_receipt_command(request: UpdateReceiptRequest) -> UpdateReceiptCommand {
    UpdateReceiptCommand {
        amount: request.amount,
        amount_paid: request.amount_paid,
        due_amount: request.due_amount,
        payment_method: request.payment_method,
        description: request.description,
    }
}

pub fn to_pay_due_command(request: PayDueRequest) -> PayDueCommand {
    PayDueCommand {
        amount: request.amount,
        payment_method: request.payment_method,
        actor: request.actor,
    }
}
