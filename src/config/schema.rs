use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["wiki", "vip"],
        "properties": {
            "wiki": {
                "type": "object",
                "required": ["server"],
                "properties": {
                    "server": { "type": "string", "format": "uri" },
                    "space": { "type": "string", "minLength": 1 },
                    "page_view_path": { "type": "string" },
                    "profile_path": { "type": "string" },
                    "acli_command": { "type": "string", "minLength": 1 },
                    "acli_timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "credentials": {
                "type": "object",
                "properties": {
                    "email": { "type": "string" },
                    "username": { "type": "string" },
                    "password": { "type": "string" },
                    "max_attempts": { "type": "integer", "minimum": 1 }
                }
            },
            "vip": {
                "type": "object",
                "required": ["department_directory_url", "other_vips_sheet_url"],
                "properties": {
                    "department_directory_url": { "type": "string", "format": "uri" },
                    "other_vips_sheet_url": { "type": "string", "format": "uri" }
                }
            },
            "coordinators": {
                "type": "array",
                "items": { "$ref": "#/$defs/coordinator" }
            },
            "rules": {
                "type": "object",
                "properties": {
                    "stale_after_days": { "type": "integer", "minimum": 0 },
                    "recency_window_days": { "type": "integer", "minimum": 0 },
                    "fallback_revision_count": { "type": "integer", "minimum": 1 },
                    "admin_fullname": { "type": "string" }
                }
            },
            "notify": {
                "type": "object",
                "properties": {
                    "subject": { "type": "string" },
                    "from": { "type": "string" },
                    "template_path": { "type": "string" },
                    "redirect_to": { "type": "string" },
                    "sendmail_command": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1
                    },
                    "inline_assets": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["content_id", "path"],
                            "properties": {
                                "content_id": { "type": "string", "minLength": 1 },
                                "path": { "type": "string" }
                            }
                        }
                    }
                }
            },
            "store": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "throttle_ms": { "type": "integer", "minimum": 0 }
                }
            },
            "retry": {
                "type": "object",
                "properties": {
                    "max_retries": { "type": "integer", "minimum": 0 }
                }
            },
            "journal": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            },
            "http": {
                "type": "object",
                "properties": {
                    "timeout_secs": { "type": "integer", "minimum": 1 }
                }
            }
        },
        "$defs": {
            "coordinator": {
                "type": "object",
                "required": ["username", "email", "fullname"],
                "properties": {
                    "username": { "type": "string", "minLength": 1 },
                    "email": { "type": "string", "minLength": 3 },
                    "fullname": { "type": "string" }
                }
            }
        }
    })
});
