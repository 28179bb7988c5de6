//! Diesel table definitions.
//!
//! Tables: auth_user, core_coding, core_resource, core_domain_resource,
//! core_domain_resource_contained, core_patient, medux_migrations.

diesel::table! {
    auth_user (id) {
        id -> Int8,
        username -> Varchar,
        email -> Varchar,
        password -> Varchar,
        is_superuser -> Bool,
        is_staff -> Bool,
        is_active -> Bool,
        date_joined -> Timestamptz,
        last_login -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    core_coding (id) {
        id -> Int8,
        system -> Nullable<Varchar>,
        version -> Nullable<Varchar>,
        code -> Varchar,
        display -> Varchar,
        user_selected -> Bool,
    }
}

diesel::table! {
    core_resource (version_id) {
        version_id -> Varchar,
        created -> Timestamptz,
        last_updated -> Timestamptz,
        profile -> Nullable<Varchar>,
        security_id -> Nullable<Int8>,
        logical_id -> Nullable<Varchar>,
        implicit_rules -> Nullable<Varchar>,
        language -> Nullable<Varchar>,
    }
}

diesel::table! {
    core_domain_resource (resource_ptr_id) {
        resource_ptr_id -> Varchar,
        narrative_status -> Varchar,
        narrative_div -> Text,
    }
}

diesel::table! {
    core_domain_resource_contained (id) {
        id -> Int8,
        domain_resource_id -> Varchar,
        resource_id -> Varchar,
    }
}

diesel::table! {
    core_patient (version_id) {
        version_id -> Varchar,
        created -> Timestamptz,
        last_updated -> Timestamptz,
        profile -> Nullable<Varchar>,
        security_id -> Nullable<Int8>,
    }
}

diesel::table! {
    medux_migrations (name) {
        name -> Varchar,
        applied_at -> Timestamptz,
    }
}

// Foreign key relationships
diesel::joinable!(core_resource -> core_coding (security_id));
diesel::joinable!(core_patient -> core_coding (security_id));
diesel::joinable!(core_domain_resource -> core_resource (resource_ptr_id));
diesel::joinable!(core_domain_resource_contained -> core_domain_resource (domain_resource_id));
diesel::joinable!(core_domain_resource_contained -> core_resource (resource_id));

diesel::allow_tables_to_appear_in_same_query!(
    auth_user,
    core_coding,
    core_resource,
    core_domain_resource,
    core_domain_resource_contained,
    core_patient,
);
