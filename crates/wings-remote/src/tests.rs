//! Тесты: разбор полей spell, построение дескриптора, аутентификация, интеграционные тесты HTTP.

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::services::catalog::{ResolvedVariable, ServerContext};
    use crate::services::descriptor::{self, EnvValue, MAX_DESCRIPTOR_BYTES};
    use crate::services::node_auth::{hash_token, parse_bearer};
    use crate::services::spell_config::{self, ConfigStop, DEFAULT_DONE_MESSAGES};
    use crate::services::status_service::{parse_reported, ServerState};
    use serde_json::{json, Value};
    use wings_entities::{allocations, nodes, realms, servers, spells};

    // ── Фикстуры ──────────────────────────────────────────────────────────────

    fn spell() -> spells::Model {
        spells::Model {
            id: 4,
            uuid: "9b1e7f0a-1c2d-4e5f-8a9b-0c1d2e3f4a5b".to_string(),
            realm_id: 2,
            name: "Paper".to_string(),
            author: Some("support@example.com".to_string()),
            startup: Some("java -Xms128M -Xmx{{server.build.memory}}M -jar {{SERVER_JARFILE}}".to_string()),
            features: Some(r#"["eula","java_version"]"#.to_string()),
            file_denylist: Some(r#"["*.jar", 5, "config/secret.yml"]"#.to_string()),
            docker_images: Some(r#"{"Java 21":"ghcr.io/pterodactyl/yolks:java_21","Java 17":"ghcr.io/pterodactyl/yolks:java_17"}"#.to_string()),
            config_files: Some(
                r#"{"server.properties":{"parser":"properties","find":{"server-port":"{{server.build.default.port}}","server-ip":{"0.0.0.0":"{{server.build.default.ip}}"}}}}"#
                    .to_string(),
            ),
            config_startup: Some(r#"{"done":")! For help, type "}"#.to_string()),
            config_logs: None,
            config_stop: Some("\"stop\"".to_string()),
            force_outgoing_ip: true,
            script_container: None,
            script_entry: None,
            script_install: None,
            copy_script_container: None,
            copy_script_entry: None,
            copy_script_install: None,
        }
    }

    fn context() -> ServerContext {
        let server = servers::Model {
            id: 7,
            uuid: "2f4c6e8a-0b1d-4f3a-9c5e-7a9b1c3d5e7f".to_string(),
            name: "Survival".to_string(),
            description: Some("Main\u{0} world".to_string()),
            node_id: 1,
            allocation_id: 10,
            spell_id: 4,
            realm_id: 2,
            memory: 2048,
            swap: 0,
            disk: 10240,
            cpu: 200,
            io: 500,
            threads: None,
            oom_disabled: false,
            allocation_limit: Some(2),
            status: "offline".to_string(),
            startup: Some("./start.sh".to_string()),
            image: "ghcr.io/pterodactyl/yolks:java_8".to_string(),
            skip_scripts: false,
            installed_at: None,
            last_error: None,
            updated_at: None,
        };
        let allocation = allocations::Model {
            id: 10,
            node_id: 1,
            ip: "10.0.0.5".to_string(),
            ip_alias: None,
            port: 25565,
            server_id: Some(7),
        };
        let extra = allocations::Model {
            id: 11,
            port: 25575,
            ..allocation.clone()
        };
        ServerContext {
            server,
            node: nodes::Model {
                id: 1,
                uuid: "node-uuid".to_string(),
                name: "node-1".to_string(),
                location_id: Some(3),
                daemon_token_id: "node-a".to_string(),
                daemon_token_hash: hash_token("secret-a"),
                created_at: "2026-01-01T00:00:00+00:00".to_string(),
            },
            allocations: vec![allocation.clone(), extra],
            allocation,
            spell: spell(),
            realm: realms::Model {
                id: 2,
                name: "Minecraft".to_string(),
                description: None,
            },
            variables: vec![ResolvedVariable {
                env_variable: "SERVER_JARFILE".to_string(),
                value: "server.jar".to_string(),
            }],
        }
    }

    // ── Аутентификация ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def"), Some(("abc", "def")));
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some(("abc", "def.ghi")));
        assert_eq!(parse_bearer("Bearer abcdef"), None);
        assert_eq!(parse_bearer("Bearer .def"), None);
        assert_eq!(parse_bearer("Bearer abc."), None);
        assert_eq!(parse_bearer("Basic abc.def"), None);
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    // ── Поля spell ────────────────────────────────────────────────────────────

    #[test]
    fn test_config_stop_bare_string_is_command() {
        let directive = ConfigStop::parse(Some("\"stop\"")).into_directive();
        assert_eq!(
            serde_json::to_value(directive).unwrap(),
            json!({"type": "command", "value": "stop"})
        );

        let directive = ConfigStop::parse(Some("end")).into_directive();
        assert_eq!(
            serde_json::to_value(directive).unwrap(),
            json!({"type": "command", "value": "end"})
        );
    }

    #[test]
    fn test_config_stop_signal_passes_through() {
        let directive =
            ConfigStop::parse(Some(r#"{"type":"signal","value":"SIGTERM"}"#)).into_directive();
        assert_eq!(
            serde_json::to_value(directive).unwrap(),
            json!({"type": "signal", "value": "SIGTERM"})
        );

        let directive = ConfigStop::parse(Some(r#"{"type":"signal","value":15}"#)).into_directive();
        assert_eq!(
            serde_json::to_value(directive).unwrap(),
            json!({"type": "signal", "value": 15})
        );
    }

    #[test]
    fn test_config_stop_invalid_shapes_fall_back_to_stop() {
        for raw in [
            Some(r#"{"type":"signal","value":[1,2]}"#),
            Some(r#"{"value":"SIGTERM"}"#),
            Some("[1,2]"),
            Some("42"),
            Some("   "),
            None,
        ] {
            assert_eq!(
                ConfigStop::parse(raw),
                ConfigStop::Command("stop".to_string()),
                "config_stop {raw:?}"
            );
        }
    }

    #[test]
    fn test_startup_detection_defaults_only_without_section() {
        let missing = spell_config::startup_detection(None);
        assert_eq!(missing.done.len(), DEFAULT_DONE_MESSAGES.len());
        assert!(!missing.user_interaction.is_empty());

        let empty = spell_config::startup_detection(Some(r#"{"done":[],"user_interaction":[]}"#));
        assert!(empty.done.is_empty(), "Явный пустой список должен сохраняться");
        assert!(empty.user_interaction.is_empty());

        let single = spell_config::startup_detection(Some(r#"{"done":"Ready","strip_ansi":true}"#));
        assert_eq!(single.done, vec!["Ready".to_string()]);
        assert!(single.strip_ansi);
    }

    #[test]
    fn test_spell_json_fields_degrade_to_empty() {
        assert_eq!(spell_config::features(Some("{broken")), json!({}));
        assert_eq!(spell_config::features(Some("\"text\"")), json!({}));
        assert_eq!(
            spell_config::file_denylist(Some(r#"["a", 1, null, "b"]"#)),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(spell_config::file_denylist(Some("{}")).is_empty());
        assert!(spell_config::config_files(Some("[]")).is_empty());
        assert_eq!(spell_config::first_docker_image(Some("not json")), None);
    }

    #[test]
    fn test_first_docker_image_order() {
        assert_eq!(
            spell_config::first_docker_image(Some(r#"["", "ghcr.io/a:1", "ghcr.io/b:2"]"#)),
            Some("ghcr.io/a:1".to_string())
        );
        assert_eq!(
            spell_config::first_docker_image(Some(r#"{"Java 21":"img21","Java 8":"img8"}"#)),
            Some("img21".to_string())
        );
    }

    // ── Дескриптор ────────────────────────────────────────────────────────────

    #[test]
    fn test_descriptor_is_deterministic() {
        let ctx = context();
        let first = descriptor::encode(&descriptor::build(&ctx)).unwrap();
        let second = descriptor::encode(&descriptor::build(&ctx)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_descriptor_sections() {
        let ctx = context();
        let value = serde_json::to_value(descriptor::build(&ctx)).unwrap();
        let settings = &value["settings"];

        assert_eq!(settings["uuid"], ctx.server.uuid.as_str());
        assert_eq!(settings["meta"]["description"], "Main world");
        assert_eq!(
            settings["invocation"],
            "java -Xms128M -Xmx2048M -jar {{SERVER_JARFILE}}"
        );
        assert_eq!(settings["container"]["image"], "ghcr.io/pterodactyl/yolks:java_21");
        assert_eq!(settings["allocations"]["default"], json!({"ip": "10.0.0.5", "port": 25565}));
        assert_eq!(
            settings["allocations"]["mappings"],
            json!({"10.0.0.5": [25565, 25575]})
        );
        assert_eq!(settings["allocations"]["force_outgoing_ip"], true);
        assert_eq!(settings["egg"]["features"], json!(["eula", "java_version"]));
        assert_eq!(settings["egg"]["file_denylist"], json!(["*.jar", "config/secret.yml"]));
        assert_eq!(settings["mounts"], json!([]));
        assert_eq!(settings["environment"]["SERVER_JARFILE"], "server.jar");
        assert_eq!(settings["environment"]["SERVER_PORT"], 25565);
        assert_eq!(settings["environment"]["P_SERVER_LOCATION"], "3");

        let process = &value["process_configuration"];
        assert_eq!(process["stop"], json!({"type": "command", "value": "stop"}));
        assert_eq!(process["startup"]["done"], json!([")! For help, type "]));
        assert_eq!(
            process["configs"],
            json!([{
                "file": "server.properties",
                "parser": "properties",
                "replace": [
                    {"match": "server-port", "replace_with": "25565"},
                    {"match": "server-ip", "if_value": "0.0.0.0", "replace_with": "10.0.0.5"}
                ]
            }])
        );
    }

    #[test]
    fn test_descriptor_startup_fallbacks() {
        let mut ctx = context();
        ctx.spell.startup = Some("  ".to_string());
        let built = descriptor::build(&ctx);
        assert_eq!(built.settings.invocation, "./start.sh");

        ctx.server.startup = None;
        let built = descriptor::build(&ctx);
        assert_eq!(
            built.settings.invocation,
            "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar {{SERVER_JARFILE}}"
        );

        ctx.spell.docker_images = Some("[]".to_string());
        let built = descriptor::build(&ctx);
        assert_eq!(built.settings.container.image, "ghcr.io/pterodactyl/yolks:java_8");
    }

    #[test]
    fn test_unlimited_memory_uses_fallback() {
        let mut ctx = context();
        ctx.server.memory = 0;
        let built = descriptor::build(&ctx);
        assert_eq!(
            built.settings.environment.get("SERVER_MEMORY"),
            Some(&EnvValue::Number(1024))
        );
        assert_eq!(
            built.settings.invocation,
            "java -Xms128M -Xmx1024M -jar {{SERVER_JARFILE}}"
        );
    }

    #[test]
    fn test_sanitize_java_memory() {
        assert_eq!(
            descriptor::sanitize_java_memory("java  -Xms0M -Xmx0M -jar a.jar", 2048),
            "java -Xmx2048M -jar a.jar"
        );
        assert_eq!(
            descriptor::sanitize_java_memory("java -Xms0M -Xmx0M -jar a.jar", 0),
            "java -jar a.jar"
        );
        assert_eq!(
            descriptor::sanitize_java_memory("java -Xmx0G -jar a.jar", 4096),
            "java -Xmx4G -jar a.jar"
        );
        assert_eq!(
            descriptor::sanitize_java_memory("java -Xms128M -Xmx{{SERVER_MEMORY}}M", 0),
            "java -Xms128M -Xmx{{SERVER_MEMORY}}M"
        );
        assert_eq!(
            descriptor::sanitize_java_memory("java -Xmx0K -jar a.jar", i64::MAX),
            format!("java -Xmx{}K -jar a.jar", i64::MAX)
        );
    }

    #[test]
    fn test_install_script_precedence() {
        use crate::services::install_service::{install_script, DEFAULT_ENTRYPOINT};

        let ctx = context();
        let mut spell = spell();

        let script = install_script(&ctx.server, &spell);
        assert_eq!(script.container_image, "ghcr.io/pterodactyl/yolks:java_21");
        assert_eq!(script.entrypoint, DEFAULT_ENTRYPOINT);
        assert_eq!(script.script, "");

        spell.script_container = Some("ghcr.io/pterodactyl/installers:debian".to_string());
        spell.script_entry = Some("bash".to_string());
        spell.script_install = Some("echo own".to_string());
        spell.copy_script_container = Some("ghcr.io/pterodactyl/installers:alpine".to_string());
        spell.copy_script_entry = Some("ash".to_string());
        spell.copy_script_install = Some("echo copied".to_string());
        let script = install_script(&ctx.server, &spell);
        assert_eq!(script.container_image, "ghcr.io/pterodactyl/installers:alpine");
        assert_eq!(script.entrypoint, "ash");
        assert_eq!(script.script, "echo copied");

        // Пустые унаследованные поля не перекрывают собственные
        spell.copy_script_container = Some("  ".to_string());
        spell.copy_script_entry = None;
        spell.copy_script_install = Some(String::new());
        let script = install_script(&ctx.server, &spell);
        assert_eq!(script.container_image, "ghcr.io/pterodactyl/installers:debian");
        assert_eq!(script.entrypoint, "bash");
        assert_eq!(script.script, "echo own");

        spell.script_container = None;
        spell.docker_images = Some("[]".to_string());
        assert_eq!(install_script(&ctx.server, &spell).container_image, ctx.server.image);
    }

    #[test]
    fn test_legacy_placeholders() {
        let ctx = context();
        let env = descriptor::environment(&ctx);
        assert_eq!(
            descriptor::render_placeholders(
                "{{env.SERVER_JARFILE}} {{server.build.env.SERVER_PORT}} {{config.docker.interface}}",
                &ctx,
                &env
            ),
            "server.jar 25565 {{config.docker.network.interface}}"
        );
    }

    #[test]
    fn test_sanitize_text_strips_control_characters() {
        use crate::services::sanitize::{sanitize_text, truncate_chars};
        assert_eq!(sanitize_text("a\u{0}b\u{1F}c\u{7F}d\té"), "abcdé");
        assert_eq!(truncate_chars("привет", 3), "при");
    }

    #[test]
    fn test_oversized_descriptor_is_config_error() {
        let mut ctx = context();
        ctx.server.description = Some("a".repeat(MAX_DESCRIPTOR_BYTES + 1));
        let err = descriptor::encode(&descriptor::build(&ctx)).unwrap_err();
        let err = AppError::from(err);
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert_eq!(err.status().as_u16(), 500);
    }

    // ── Статусы и тела запросов ───────────────────────────────────────────────

    #[test]
    fn test_reported_state_enumeration() {
        assert_eq!(parse_reported("running"), Some(ServerState::Running));
        assert_eq!(parse_reported("backup_failed"), Some(ServerState::BackupFailed));
        assert_eq!(parse_reported("installed"), None);
        assert_eq!(parse_reported("reinstall_failed"), None);
        assert_eq!(parse_reported("bogus"), None);
        assert_eq!(parse_reported("RUNNING"), None);
    }

    #[test]
    fn test_payload_helpers() {
        use crate::api::payload;

        assert_eq!(
            payload::json_object(b"[1]").unwrap_err().error_code(),
            "INVALID_JSON"
        );
        assert_eq!(payload::json_object(b"").unwrap_err().error_code(), "INVALID_JSON");

        let body = payload::json_object(br#"{"successful":"yes","error":3}"#).unwrap();
        assert!(payload::required_bool(&body, "successful").unwrap());
        assert!(!payload::optional_bool(&body, "reinstall"));
        assert_eq!(
            payload::error_field(&body).unwrap_err().error_code(),
            "INVALID_ERROR_FIELD"
        );
        assert_eq!(
            payload::required_bool(&body, "missing").unwrap_err().error_code(),
            "MISSING_FIELD"
        );

        assert_eq!(payload::lenient_bool(&json!(0)), Some(false));
        assert_eq!(payload::lenient_bool(&json!("on")), Some(true));
        assert_eq!(payload::lenient_bool(&json!("false")), Some(false));

        let nested =
            payload::json_object(br#"{"data":{"new_state":"crashed","error":"boom"}}"#).unwrap();
        assert_eq!(
            payload::reported_state(&nested).unwrap(),
            ("crashed".to_string(), Some("boom".to_string()))
        );
        let missing = payload::json_object(br#"{"state":5}"#).unwrap();
        assert_eq!(
            payload::reported_state(&missing).unwrap_err().error_code(),
            "MISSING_STATE"
        );
    }

    #[test]
    fn test_pagination_links() {
        use crate::api::remote_routes::pagination;

        let panel = url::Url::parse("https://panel.example.com/").unwrap();
        let (links, meta) = pagination(&panel, 2, 50, 120);
        assert_eq!(links.first, "https://panel.example.com/api/remote/servers?page=1");
        assert_eq!(links.last, "https://panel.example.com/api/remote/servers?page=3");
        assert_eq!(
            links.prev.as_deref(),
            Some("https://panel.example.com/api/remote/servers?page=1")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("https://panel.example.com/api/remote/servers?page=3")
        );
        assert_eq!((meta.from, meta.to, meta.last_page), (51, 100, 3));
        assert_eq!(meta.path, "https://panel.example.com/api/remote/servers");

        let (links, meta) = pagination(&panel, 1, 50, 0);
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
        assert_eq!((meta.last_page, meta.to), (1, 0));
    }

    #[test]
    fn test_page_window_bounds() {
        use crate::api::remote_routes::{page_window, DEFAULT_PER_PAGE, MAX_PER_PAGE};

        assert_eq!(page_window(None, None), (1, DEFAULT_PER_PAGE));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1));
        assert_eq!(page_window(Some(3), Some(u64::MAX)), (3, MAX_PER_PAGE));

        for (page, per_page) in [
            (Some(u64::MAX), Some(2)),
            (Some(u64::MAX), Some(1)),
            (Some(2), Some(u64::MAX)),
        ] {
            let (page, per_page) = page_window(page, per_page);
            let offset = (page - 1).checked_mul(per_page).unwrap();
            assert!(offset <= i64::MAX as u64, "offset {offset}");
        }
    }

    // ── HTTP интеграционные тесты ─────────────────────────────────────────────

    mod integration {
        use crate::api::{build_router, AppState};
        use crate::events::{self, EventSink};
        use crate::services::node_auth::hash_token;
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::Router;
        use sea_orm::{
            ActiveModelTrait, ActiveValue::Set, ColumnTrait, Database, DatabaseConnection,
            EntityTrait, PaginatorTrait, QueryFilter,
        };
        use serde_json::{json, Value};
        use std::sync::{Arc, Mutex};
        use tower::ServiceExt;
        use wings_entities::{
            allocations, nodes, realms, server_activities, server_imports, server_variables,
            servers, spell_variables, spells,
        };
        use wings_migration::{Migrator, MigratorTrait};

        const NODE_A: &str = "node-a.secret-a";
        const NODE_B: &str = "node-b.secret-b";

        #[derive(Default)]
        struct RecordingEventSink {
            events: Mutex<Vec<(String, Value)>>,
        }

        impl RecordingEventSink {
            fn names(&self) -> Vec<String> {
                self.events
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect()
            }
        }

        impl EventSink for RecordingEventSink {
            fn notify(&self, event: &str, payload: Value) {
                self.events
                    .lock()
                    .unwrap()
                    .push((event.to_string(), payload));
            }
        }

        struct TestApp {
            app: Router,
            db: DatabaseConnection,
            events: Arc<RecordingEventSink>,
            node_a: nodes::Model,
            node_b: nodes::Model,
            spell: spells::Model,
        }

        async fn build_test_app(lenient_import_get: bool) -> TestApp {
            let db: DatabaseConnection = Database::connect("sqlite::memory:").await.unwrap();
            Migrator::up(&db, None).await.unwrap();

            let node_a = seed_node(&db, "node-a", "secret-a").await;
            let node_b = seed_node(&db, "node-b", "secret-b").await;

            let realm = realms::ActiveModel {
                name: Set("Minecraft".to_string()),
                description: Set(None),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();

            let spell = spells::ActiveModel {
                uuid: Set(uuid::Uuid::new_v4().to_string()),
                realm_id: Set(realm.id),
                name: Set("Paper".to_string()),
                author: Set(None),
                startup: Set(Some("java -Xmx{{server.build.memory}}M -jar {{SERVER_JARFILE}}".to_string())),
                features: Set(Some(r#"["eula"]"#.to_string())),
                file_denylist: Set(None),
                docker_images: Set(Some(r#"["ghcr.io/pterodactyl/yolks:java_21"]"#.to_string())),
                config_files: Set(None),
                config_startup: Set(None),
                config_logs: Set(None),
                config_stop: Set(Some(r#"{"type":"signal","value":"SIGTERM"}"#.to_string())),
                force_outgoing_ip: Set(false),
                script_container: Set(Some("ghcr.io/pterodactyl/installers:debian".to_string())),
                script_entry: Set(None),
                script_install: Set(Some("#!/bin/bash\necho install".to_string())),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();

            spell_variables::ActiveModel {
                spell_id: Set(spell.id),
                name: Set("Server Jar File".to_string()),
                env_variable: Set("SERVER_JARFILE".to_string()),
                default_value: Set(Some("server.jar".to_string())),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();

            spell_variables::ActiveModel {
                spell_id: Set(spell.id),
                name: Set("Version".to_string()),
                env_variable: Set("MINECRAFT_VERSION".to_string()),
                default_value: Set(Some("latest".to_string())),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();

            let events = Arc::new(RecordingEventSink::default());
            let state = AppState {
                db: db.clone(),
                events: events.clone(),
                panel_url: url::Url::parse("https://panel.example.com").unwrap(),
                lenient_import_get,
            };

            TestApp {
                app: build_router(state),
                db,
                events,
                node_a,
                node_b,
                spell,
            }
        }

        async fn seed_node(db: &DatabaseConnection, token_id: &str, secret: &str) -> nodes::Model {
            nodes::ActiveModel {
                uuid: Set(uuid::Uuid::new_v4().to_string()),
                name: Set(token_id.to_string()),
                location_id: Set(Some(1)),
                daemon_token_id: Set(token_id.to_string()),
                daemon_token_hash: Set(hash_token(secret)),
                created_at: Set(chrono::Utc::now().to_rfc3339()),
                ..Default::default()
            }
            .insert(db)
            .await
            .unwrap()
        }

        async fn seed_server(t: &TestApp, node: &nodes::Model, status: &str) -> servers::Model {
            let port = 25565
                + servers::Entity::find().count(&t.db).await.unwrap() as i32;
            let allocation = allocations::ActiveModel {
                node_id: Set(node.id),
                ip: Set("10.0.0.5".to_string()),
                ip_alias: Set(None),
                port: Set(port),
                server_id: Set(None),
                ..Default::default()
            }
            .insert(&t.db)
            .await
            .unwrap();

            let server = servers::ActiveModel {
                uuid: Set(uuid::Uuid::new_v4().to_string()),
                name: Set(format!("server-{port}")),
                description: Set(None),
                node_id: Set(node.id),
                allocation_id: Set(allocation.id),
                spell_id: Set(t.spell.id),
                realm_id: Set(t.spell.realm_id),
                memory: Set(2048),
                swap: Set(0),
                disk: Set(10240),
                cpu: Set(100),
                io: Set(500),
                threads: Set(None),
                oom_disabled: Set(false),
                allocation_limit: Set(None),
                status: Set(status.to_string()),
                startup: Set(None),
                image: Set("ghcr.io/pterodactyl/yolks:java_17".to_string()),
                skip_scripts: Set(false),
                installed_at: Set(None),
                last_error: Set(None),
                updated_at: Set(None),
                ..Default::default()
            }
            .insert(&t.db)
            .await
            .unwrap();

            let mut allocation: allocations::ActiveModel = allocation.into();
            allocation.server_id = Set(Some(server.id));
            allocation.update(&t.db).await.unwrap();

            server
        }

        async fn seed_import(t: &TestApp, server: &servers::Model, status: &str) -> server_imports::Model {
            server_imports::ActiveModel {
                server_id: Set(server.id),
                status: Set(status.to_string()),
                error: Set(None),
                created_at: Set(chrono::Utc::now().to_rfc3339()),
                completed_at: Set(None),
                ..Default::default()
            }
            .insert(&t.db)
            .await
            .unwrap()
        }

        async fn reload(t: &TestApp, server: &servers::Model) -> servers::Model {
            servers::Entity::find_by_id(server.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap()
        }

        async fn send(
            t: &TestApp,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<&str>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
            let body = match body {
                Some(body) => {
                    request = request.header("content-type", "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };

            let response = t
                .app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap();

            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        #[tokio::test]
        async fn test_health_check() {
            let t = build_test_app(true).await;
            let (status, body) = send(&t, "GET", "/health", None, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["database"], true);
        }

        #[tokio::test]
        async fn test_invalid_credentials_are_forbidden() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let uri = format!("/api/remote/servers/{}", server.uuid);

            for token in [None, Some("node-a.wrong"), Some("unknown.secret-a"), Some("node-a")] {
                let (status, body) = send(&t, "GET", &uri, token, None).await;
                assert_eq!(status, StatusCode::FORBIDDEN, "token {token:?}");
                assert_eq!(body["success"], false);
                assert_eq!(body["error_code"], "INVALID_WINGS_AUTH");
            }
        }

        #[tokio::test]
        async fn test_cross_node_request_is_not_found() {
            let t = build_test_app(true).await;
            let foreign = seed_server(&t, &t.node_b, "running").await;

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}", foreign.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error_code"], "SERVER_NOT_FOUND");

            let (status, _) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/container-status", foreign.uuid),
                Some(NODE_A),
                Some(r#"{"state":"offline"}"#),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(reload(&t, &foreign).await.status, "running");

            let (status, body) =
                send(&t, "GET", "/api/remote/servers/not-a-uuid", Some(NODE_A), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error_code"], "SERVER_NOT_FOUND");

            let (status, _) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}", foreign.uuid),
                Some(NODE_B),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        #[tokio::test]
        async fn test_server_descriptor() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;

            let version = spell_variables::Entity::find()
                .filter(spell_variables::Column::EnvVariable.eq("MINECRAFT_VERSION"))
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            server_variables::ActiveModel {
                server_id: Set(server.id),
                variable_id: Set(version.id),
                variable_value: Set(Some("1.21.1".to_string())),
                ..Default::default()
            }
            .insert(&t.db)
            .await
            .unwrap();

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let settings = &body["settings"];
            assert_eq!(settings["uuid"], server.uuid.as_str());
            assert_eq!(settings["invocation"], "java -Xmx2048M -jar {{SERVER_JARFILE}}");
            assert_eq!(settings["environment"]["SERVER_JARFILE"], "server.jar");
            assert_eq!(settings["environment"]["MINECRAFT_VERSION"], "1.21.1");
            assert_eq!(settings["container"]["image"], "ghcr.io/pterodactyl/yolks:java_21");
            assert_eq!(
                body["process_configuration"]["stop"],
                json!({"type": "signal", "value": "SIGTERM"})
            );
            assert!(t
                .events
                .names()
                .contains(&events::SERVER_INFO_RETRIEVED.to_string()));

            // Построение дескриптора ничего не пишет
            assert_eq!(reload(&t, &server).await, server);
        }

        #[tokio::test]
        async fn test_descriptor_missing_spell() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let mut broken: servers::ActiveModel = server.clone().into();
            broken.spell_id = Set(9999);
            broken.update(&t.db).await.unwrap();

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error_code"], "SPELL_NOT_FOUND");

            // В списке такой сервер просто пропускается
            let healthy = seed_server(&t, &t.node_a, "offline").await;
            let (status, body) = send(&t, "GET", "/api/remote/servers", Some(NODE_A), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"].as_array().unwrap().len(), 1);
            assert_eq!(body["data"][0]["uuid"], healthy.uuid.as_str());
        }

        #[tokio::test]
        async fn test_list_servers_paginates_node_servers() {
            let t = build_test_app(true).await;
            let first = seed_server(&t, &t.node_a, "offline").await;
            seed_server(&t, &t.node_a, "running").await;
            seed_server(&t, &t.node_b, "running").await;

            let (status, body) = send(
                &t,
                "GET",
                "/api/remote/servers?page=1&per_page=1",
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"].as_array().unwrap().len(), 1);
            assert_eq!(body["data"][0]["uuid"], first.uuid.as_str());
            assert!(body["data"][0]["settings"].is_object());
            assert!(body["data"][0]["process_configuration"].is_object());
            assert_eq!(body["meta"]["total"], 2);
            assert_eq!(body["meta"]["last_page"], 2);
            assert_eq!(
                body["links"]["next"],
                "https://panel.example.com/api/remote/servers?page=2"
            );
            assert_eq!(body["links"]["prev"], Value::Null);

            let (_, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers?search={}", &first.uuid[..8]),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(body["meta"]["total"], 1);
        }

        #[tokio::test]
        async fn test_list_servers_pagination_bounds() {
            let t = build_test_app(true).await;
            let first = seed_server(&t, &t.node_a, "offline").await;
            seed_server(&t, &t.node_a, "running").await;

            for query in [
                "page=2&per_page=18446744073709551615",
                "page=18446744073709551615&per_page=2",
                "per_page=9223372036854775808",
                "page=9223372036854775807&per_page=1",
                "page=0&per_page=0",
                "page=abc&per_page=-5",
                "page=&per_page=1e3",
            ] {
                let (status, body) = send(
                    &t,
                    "GET",
                    &format!("/api/remote/servers?{query}"),
                    Some(NODE_A),
                    None,
                )
                .await;
                assert_eq!(status, StatusCode::OK, "query {query}");
                assert!(body["data"].is_array(), "query {query}");
                assert_eq!(body["meta"]["total"], 2, "query {query}");
                let per_page = body["meta"]["per_page"].as_u64().unwrap();
                assert!((1..=500).contains(&per_page), "query {query}");
            }

            let (_, body) = send(
                &t,
                "GET",
                "/api/remote/servers?page=0&per_page=0",
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(body["meta"]["current_page"], 1);
            assert_eq!(body["meta"]["per_page"], 1);
            assert_eq!(body["data"][0]["uuid"], first.uuid.as_str());

            let (_, body) = send(
                &t,
                "GET",
                "/api/remote/servers?page=18446744073709551615&per_page=2",
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(body["data"].as_array().unwrap().len(), 0);
            assert_eq!(body["meta"]["last_page"], 1);
        }

        #[tokio::test]
        async fn test_install_script() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "installing").await;

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}/install", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({
                    "container_image": "ghcr.io/pterodactyl/installers:debian",
                    "entrypoint": "/bin/bash",
                    "script": "#!/bin/bash\necho install",
                })
            );

            // Унаследованный скрипт важнее собственного
            let mut inherited: spells::ActiveModel = t.spell.clone().into();
            inherited.copy_script_container =
                Set(Some("ghcr.io/pterodactyl/installers:alpine".to_string()));
            inherited.copy_script_entry = Set(Some("ash".to_string()));
            inherited.copy_script_install = Set(Some("#!/bin/ash\necho copied".to_string()));
            inherited.update(&t.db).await.unwrap();

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}/install", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({
                    "container_image": "ghcr.io/pterodactyl/installers:alpine",
                    "entrypoint": "ash",
                    "script": "#!/bin/ash\necho copied",
                })
            );
        }

        #[tokio::test]
        async fn test_install_then_running_keeps_installed_at() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "installing").await;

            let (status, _) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/install", server.uuid),
                Some(NODE_A),
                Some(r#"{"successful":true,"reinstall":false}"#),
            )
            .await;
            assert_eq!(status, StatusCode::NO_CONTENT);

            let installed = reload(&t, &server).await;
            assert_eq!(installed.status, "installed");
            let installed_at = installed.installed_at.clone();
            assert!(installed_at.is_some());

            let (status, body) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/container-status", server.uuid),
                Some(NODE_A),
                Some(r#"{"state":"running"}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["state"], "running");
            assert_eq!(body["server_uuid"], server.uuid.as_str());

            let running = reload(&t, &server).await;
            assert_eq!(running.status, "running");
            assert_eq!(running.installed_at, installed_at);

            let names = t.events.names();
            assert!(names.contains(&events::SERVER_INSTALL_COMPLETED.to_string()));
            assert!(names.contains(&events::SERVER_STATUS_UPDATED.to_string()));
        }

        #[tokio::test]
        async fn test_install_outcomes() {
            let t = build_test_app(true).await;
            let failed = seed_server(&t, &t.node_a, "installing").await;
            let reinstall = seed_server(&t, &t.node_a, "installing").await;
            let suspended = seed_server(&t, &t.node_a, "suspended").await;

            for (server, body) in [
                (&failed, r#"{"successful":false}"#),
                (&reinstall, r#"{"successful":false,"reinstall":true}"#),
                (&suspended, r#"{"successful":true}"#),
            ] {
                let (status, _) = send(
                    &t,
                    "POST",
                    &format!("/api/remote/servers/{}/install", server.uuid),
                    Some(NODE_A),
                    Some(body),
                )
                .await;
                assert_eq!(status, StatusCode::NO_CONTENT);
            }

            let failed = reload(&t, &failed).await;
            assert_eq!(failed.status, "install_failed");
            assert_eq!(failed.installed_at, None);
            assert_eq!(reload(&t, &reinstall).await.status, "reinstall_failed");
            let suspended = reload(&t, &suspended).await;
            assert_eq!(suspended.status, "suspended");
            assert_eq!(suspended.installed_at, None);
        }

        #[tokio::test]
        async fn test_install_validation() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "installing").await;
            let uri = format!("/api/remote/servers/{}/install", server.uuid);

            let (status, body) = send(&t, "POST", &uri, Some(NODE_A), Some("{not json")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error_code"], "INVALID_JSON");

            let (status, body) = send(&t, "POST", &uri, Some(NODE_A), Some(r#"{"reinstall":true}"#)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error_code"], "MISSING_FIELD");

            for empty in ["{}", "", "  "] {
                let (status, body) = send(&t, "POST", &uri, Some(NODE_A), Some(empty)).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "body {empty:?}");
                assert_eq!(body["error_code"], "INVALID_JSON");
            }

            let oversized = format!(r#"{{"successful":true,"pad":"{}"}}"#, "x".repeat(3 * 1024 * 1024));
            let (status, body) = send(&t, "POST", &uri, Some(NODE_A), Some(&oversized)).await;
            assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
            assert_eq!(body["success"], false);
            assert_eq!(body["error_code"], "PAYLOAD_TOO_LARGE");

            assert_eq!(reload(&t, &server).await.status, "installing");
        }

        #[tokio::test]
        async fn test_import_callback_is_idempotent() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let import = seed_import(&t, &server, "completed").await;

            let (status, body) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/import", server.uuid),
                Some(NODE_A),
                Some(r#"{"successful":false,"error":"late failure"}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);

            let after = server_imports::Entity::find_by_id(import.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after, import);
        }

        #[tokio::test]
        async fn test_import_without_active_import_is_noop() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;

            let (status, body) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/import", server.uuid),
                Some(NODE_A),
                Some(r#"{"successful":true}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(server_imports::Entity::find().count(&t.db).await.unwrap(), 0);
            assert_eq!(server_activities::Entity::find().count(&t.db).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_import_failure_is_recorded() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            seed_import(&t, &server, "completed").await;
            let active = seed_import(&t, &server, "importing").await;

            let (status, _) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/import", server.uuid),
                Some(NODE_A),
                Some(r#"{"successful":false,"error":"  disk full \u0007 "}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let after = server_imports::Entity::find_by_id(active.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after.status, "failed");
            assert_eq!(after.error.as_deref(), Some("disk full"));
            assert!(after.completed_at.is_some());

            let activity = server_activities::Entity::find()
                .filter(server_activities::Column::ServerId.eq(server.id))
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(activity.event, "server_import_failed");
            assert_eq!(activity.node_id, t.node_a.id);
            let metadata: Value = serde_json::from_str(activity.metadata.as_deref().unwrap()).unwrap();
            assert_eq!(
                metadata,
                json!({"successful": false, "error": "disk full", "import_id": active.id})
            );
            assert!(t
                .events
                .names()
                .contains(&events::SERVER_IMPORT_STATUS.to_string()));
        }

        #[tokio::test]
        async fn test_import_validation() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let import = seed_import(&t, &server, "pending").await;
            let uri = format!("/api/remote/servers/{}/import", server.uuid);

            for (body, code) in [
                ("[", "INVALID_JSON"),
                (r#"{"error":"x"}"#, "MISSING_FIELD"),
                (r#"{"successful":false,"error":{"text":"x"}}"#, "INVALID_ERROR_FIELD"),
            ] {
                let (status, response) = send(&t, "POST", &uri, Some(NODE_A), Some(body)).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
                assert_eq!(response["error_code"], code);
            }

            let after = server_imports::Entity::find_by_id(import.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after, import);
        }

        #[tokio::test]
        async fn test_import_get_compatibility() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let uri = format!("/api/remote/servers/{}/import", server.uuid);

            let explicit = seed_import(&t, &server, "pending").await;
            let (status, body) =
                send(&t, "GET", &format!("{uri}?successful=false&error=broken"), Some(NODE_A), None)
                    .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            let explicit = server_imports::Entity::find_by_id(explicit.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(explicit.status, "failed");
            assert_eq!(explicit.error.as_deref(), Some("broken"));

            let bare = seed_import(&t, &server, "importing").await;
            let (status, _) = send(&t, "GET", &uri, Some(NODE_A), None).await;
            assert_eq!(status, StatusCode::OK);
            let bare = server_imports::Entity::find_by_id(bare.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(bare.status, "completed");
        }

        #[tokio::test]
        async fn test_import_get_without_status_when_strict() {
            let t = build_test_app(false).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let import = seed_import(&t, &server, "pending").await;

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}/import", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);

            let after = server_imports::Entity::find_by_id(import.id)
                .one(&t.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after.status, "pending");
        }

        #[tokio::test]
        async fn test_invalid_state_is_rejected() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "offline").await;
            let uri = format!("/api/remote/servers/{}/container-status", server.uuid);

            for (body, code) in [
                (r#"{"state":"bogus"}"#, "INVALID_STATE"),
                (r#"{"state":"installed"}"#, "INVALID_STATE"),
                (r#"{"data":{}}"#, "MISSING_STATE"),
                ("nope", "INVALID_JSON"),
            ] {
                let (status, response) = send(&t, "POST", &uri, Some(NODE_A), Some(body)).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
                assert_eq!(response["error_code"], code);
            }

            assert_eq!(reload(&t, &server).await, server);
        }

        #[tokio::test]
        async fn test_failure_state_stores_error() {
            let t = build_test_app(true).await;
            let server = seed_server(&t, &t.node_a, "running").await;

            let (status, _) = send(
                &t,
                "POST",
                &format!("/api/remote/servers/{}/container/status", server.uuid),
                Some(NODE_A),
                Some(r#"{"data":{"new_state":"crashed","error":"exit code 137"}}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let crashed = reload(&t, &server).await;
            assert_eq!(crashed.status, "crashed");
            assert_eq!(crashed.last_error.as_deref(), Some("exit code 137"));
            assert!(crashed.updated_at.is_some());

            let (status, body) = send(
                &t,
                "GET",
                &format!("/api/remote/servers/{}/container-status", server.uuid),
                Some(NODE_A),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({
                    "success": true,
                    "state": "crashed",
                    "server_uuid": server.uuid,
                    "node_id": t.node_a.id,
                })
            );
        }

        #[tokio::test]
        async fn test_reset_clears_transient_states() {
            let t = build_test_app(true).await;
            let starting = seed_server(&t, &t.node_a, "starting").await;
            let stopping = seed_server(&t, &t.node_a, "stopping").await;
            let running = seed_server(&t, &t.node_a, "running").await;
            let other_node = seed_server(&t, &t.node_b, "starting").await;

            let (status, body) =
                send(&t, "POST", "/api/remote/servers/reset", Some(NODE_A), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["reset"], 2);

            assert_eq!(reload(&t, &starting).await.status, "offline");
            assert_eq!(reload(&t, &stopping).await.status, "offline");
            assert_eq!(reload(&t, &running).await, running);
            assert_eq!(reload(&t, &other_node).await, other_node);
            assert!(t
                .events
                .names()
                .contains(&events::SERVERS_RESET_COMPLETED.to_string()));
        }
    }
}
