//! The application table catalogue.
//!
//! Declaration order is significant: it breaks ties within a tier when
//! the create order is computed.

use super::table::{Column, ColumnType, DropPolicy, Index, TableDef, Tier};

const fn text(name: &'static str) -> Column {
    Column::new(name, ColumnType::Text)
}

const fn stamp(name: &'static str) -> Column {
    Column::new(name, ColumnType::Timestamp)
}

const fn table(
    name: &'static str,
    tier: Tier,
    columns: &'static [Column],
    indexes: &'static [Index],
) -> TableDef {
    TableDef {
        name,
        tier,
        columns,
        indexes,
        drop_policy: DropPolicy::Strict,
        seeded: true,
    }
}

/// Append-only change log written by the event store.
pub const CHANGE_EVENTS: TableDef = TableDef {
    name: "change_events",
    tier: Tier::Foundation,
    columns: &[
        Column::id(),
        text("table_name"),
        text("record_id"),
        text("operation"),
        Column::new("before_snapshot", ColumnType::Json).nullable(),
        Column::new("after_snapshot", ColumnType::Json).nullable(),
        text("actor_user_id"),
        text("node_id"),
        text("request_id"),
        text("ip"),
        stamp("created_at"),
        Column::new("consumed", ColumnType::Bool),
        Column::new("synced", ColumnType::Bool),
    ],
    indexes: &[
        Index {
            name: "idx_change_events_record",
            columns: &["table_name", "record_id"],
        },
        Index {
            name: "idx_change_events_created",
            columns: &["created_at", "id"],
        },
        Index {
            name: "idx_change_events_consumed",
            columns: &["consumed"],
        },
        Index {
            name: "idx_change_events_synced",
            columns: &["synced"],
        },
    ],
    drop_policy: DropPolicy::Strict,
    seeded: false,
};

const PERMISSIONS: TableDef = table(
    "permissions",
    Tier::Foundation,
    &[Column::id(), text("label"), text("description").nullable()],
    &[],
);

const ROLES: TableDef = table(
    "roles",
    Tier::Foundation,
    &[Column::id(), text("label"), Column::new("permissions", ColumnType::Json)],
    &[],
);

const MEDIA_DIMENSIONS: TableDef = table(
    "media_dimensions",
    Tier::Foundation,
    &[
        Column::id(),
        text("label"),
        Column::new("width", ColumnType::Integer),
        Column::new("height", ColumnType::Integer),
        text("aspect_ratio").nullable(),
    ],
    &[],
);

const USERS: TableDef = table(
    "users",
    Tier::UserManagement,
    &[
        Column::id(),
        text("username"),
        text("name"),
        text("email"),
        text("hash"),
        Column::foreign("role_id", "roles"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[Index {
        name: "idx_users_email",
        columns: &["email"],
    }],
);

const USER_OAUTH: TableDef = TableDef {
    drop_policy: DropPolicy::Tolerant,
    ..table(
        "user_oauth",
        Tier::UserManagement,
        &[
            Column::id(),
            Column::foreign("user_id", "users"),
            text("provider"),
            text("provider_user_id"),
            text("access_token"),
            text("refresh_token").nullable(),
            stamp("token_expires_at").nullable(),
            stamp("created_at"),
        ],
        &[Index {
            name: "idx_user_oauth_provider",
            columns: &["provider", "provider_user_id"],
        }],
    )
};

const SESSIONS: TableDef = table(
    "sessions",
    Tier::UserManagement,
    &[
        Column::id(),
        Column::foreign("user_id", "users"),
        stamp("expires_at"),
        text("ip").nullable(),
        text("user_agent").nullable(),
        stamp("created_at"),
    ],
    &[Index {
        name: "idx_sessions_user",
        columns: &["user_id"],
    }],
);

const TOKENS: TableDef = table(
    "tokens",
    Tier::UserManagement,
    &[
        Column::id(),
        Column::foreign("user_id", "users"),
        text("token_type"),
        text("token"),
        stamp("issued_at"),
        stamp("expires_at"),
        Column::new("revoked", ColumnType::Bool),
    ],
    &[Index {
        name: "idx_tokens_user",
        columns: &["user_id"],
    }],
);

const ROUTES: TableDef = table(
    "routes",
    Tier::CoreContent,
    &[
        Column::id(),
        text("slug"),
        text("title"),
        Column::new("status", ColumnType::Integer),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[Index {
        name: "idx_routes_slug",
        columns: &["slug"],
    }],
);

const DATATYPES: TableDef = table(
    "datatypes",
    Tier::CoreContent,
    &[
        Column::id(),
        Column::foreign("parent_id", "datatypes").nullable(),
        text("label"),
        text("kind"),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[],
);

const MEDIA: TableDef = table(
    "media",
    Tier::CoreContent,
    &[
        Column::id(),
        text("name"),
        text("display_name").nullable(),
        text("alt").nullable(),
        text("mimetype"),
        text("url"),
        Column::foreign("dimension_id", "media_dimensions").nullable(),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[],
);

const FIELDS: TableDef = table(
    "fields",
    Tier::FieldDefinitions,
    &[
        Column::id(),
        Column::foreign("datatype_id", "datatypes"),
        text("label"),
        text("kind"),
        Column::new("data", ColumnType::Json),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[Index {
        name: "idx_fields_datatype",
        columns: &["datatype_id"],
    }],
);

const CONTENT_DATA: TableDef = table(
    "content_data",
    Tier::ContentValues,
    &[
        Column::id(),
        Column::foreign("route_id", "routes"),
        Column::foreign("datatype_id", "datatypes"),
        Column::foreign("parent_id", "content_data").nullable(),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[Index {
        name: "idx_content_data_route",
        columns: &["route_id"],
    }],
);

const CONTENT_FIELDS: TableDef = table(
    "content_fields",
    Tier::ContentValues,
    &[
        Column::id(),
        Column::foreign("content_data_id", "content_data"),
        Column::foreign("field_id", "fields"),
        Column::foreign("route_id", "routes"),
        text("value"),
        Column::foreign("author_id", "users"),
        stamp("created_at"),
        stamp("updated_at"),
    ],
    &[Index {
        name: "idx_content_fields_content",
        columns: &["content_data_id"],
    }],
);

const ROLE_PERMISSIONS: TableDef = table(
    "role_permissions",
    Tier::Junction,
    &[
        Column::foreign("role_id", "roles").primary_key(),
        Column::foreign("permission_id", "permissions").primary_key(),
    ],
    &[],
);

const DATATYPE_FIELDS: TableDef = table(
    "datatype_fields",
    Tier::Junction,
    &[
        Column::foreign("datatype_id", "datatypes").primary_key(),
        Column::foreign("field_id", "fields").primary_key(),
        Column::new("sort_order", ColumnType::Integer),
    ],
    &[],
);

/// Every application table, in declaration order.
pub const TABLES: &[TableDef] = &[
    CHANGE_EVENTS,
    PERMISSIONS,
    ROLES,
    MEDIA_DIMENSIONS,
    USERS,
    USER_OAUTH,
    SESSIONS,
    TOKENS,
    ROUTES,
    DATATYPES,
    MEDIA,
    FIELDS,
    CONTENT_DATA,
    CONTENT_FIELDS,
    ROLE_PERMISSIONS,
    DATATYPE_FIELDS,
];
