//! Charms shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use anyhow::anyhow;
use ops_scenario::{on, Charm, Context, EventContext, ExecOptions, Framework, Model};
use scenario_state::{
    CharmSpec, ConfigValue, CustomEvent, Layer, Port, Service, Startup, State, Status,
};

pub const METADATA: &str = r"
name: webapp
requires:
  db:
    interface: postgresql_client
    limit: 1
peers:
  cluster:
    interface: webapp-peers
containers:
  web: {}
storage:
  data:
    type: filesystem
";

pub const CONFIG: &str = r"
options:
  greeting:
    type: string
    default: hello
  defer-updates:
    type: boolean
    default: false
";

pub const ACTIONS: &str = r"
backup:
  params:
    target:
      type: string
      default: /backups
    full:
      type: boolean
refuse: {}
";

pub fn spec() -> CharmSpec {
    CharmSpec::from_yaml(METADATA, Some(CONFIG), Some(ACTIONS)).unwrap()
}

pub fn context<C: Charm>() -> Context<C> {
    Context::<C>::builder().spec(spec()).build().unwrap()
}

/// Sets its status from leadership on start.
pub struct Ruler;

impl Ruler {
    fn on_start(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        let model = ctx.model();
        let message = if model.is_leader() { "I rule" } else { "I am ruled" };
        model.set_unit_status(Status::active(message))?;
        Ok(())
    }
}

impl Charm for Ruler {
    fn embedded_spec() -> Option<CharmSpec> {
        Some(spec())
    }

    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        framework.observe(on::START, Ruler::on_start);
        Ok(Ruler)
    }
}

/// A web application exercising most of the model.
#[derive(Debug, Default)]
pub struct WebApp {
    pub seen: Vec<String>,
}

impl WebApp {
    fn note(&mut self, ctx: &EventContext<'_>) {
        self.seen.push(ctx.event().name());
    }

    fn on_install(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        ctx.emit(CustomEvent::new("configured").with("by", "install"));
        ctx.model().set_unit_status(Status::maintenance("installing"))?;
        Ok(())
    }

    fn on_configured(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        ctx.model().stored_set("configured", true);
        Ok(())
    }

    fn on_update_status(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        let model = ctx.model();
        if model.config_value("defer-updates") == Some(ConfigValue::Bool(true)) {
            ctx.defer()?;
            return Ok(());
        }
        let count = model.stored_get("updates").and_then(|v| v.as_u64()).unwrap_or(0);
        model.stored_set("updates", count + 1);
        Ok(())
    }

    fn on_config_changed(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        let model = ctx.model();
        if let Some(ConfigValue::String(greeting)) = model.config_value("greeting") {
            model.set_workload_version(&greeting);
        }
        model.open_port(Port::tcp(8080))?;
        Ok(())
    }

    fn on_db_changed(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        let Some(id) = relation_id(ctx) else {
            return Ok(());
        };
        let model = ctx.model();
        let host = model
            .remote_app_data(id)?
            .get("host")
            .cloned()
            .unwrap_or_default();
        model.set_relation_data(id, "db-host", &host, false)?;
        model.set_relation_data(id, "ready", "yes", true)?;
        Ok(())
    }

    fn on_web_pebble_ready(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        let model = ctx.model();
        let mut pebble = model.pebble("web")?;
        let layer = Layer {
            services: BTreeMap::from([(
                "server".to_string(),
                Service {
                    command: Some("serve --port 8080".into()),
                    startup: Startup::Enabled,
                    ..Service::default()
                },
            )]),
            ..Layer::default()
        };
        pebble.add_layer("web", layer, true)?;
        pebble.replan_services()?;
        let (listing, _) = pebble
            .exec(&["ls", "-l", "/srv"], ExecOptions::default())?
            .wait_output()?;
        pebble.push("/srv/listing.txt", listing.as_bytes(), true)?;
        Ok(())
    }

    fn on_backup_action(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        let params = ctx.params()?;
        let target = params
            .get("target")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        ctx.log(&format!("backing up to {target}"))?;
        ctx.set_results([("target", target)])?;
        Ok(())
    }

    fn on_refuse_action(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        self.note(ctx);
        ctx.set_results([("attempted", true)])?;
        ctx.fail("refusing")?;
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        Err(anyhow!("stop handler failed"))
    }

    fn on_remove(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        ctx.model().set_unit_status(Status::maintenance("removing"))?;
        panic!("remove handler panicked");
    }
}

fn relation_id(ctx: &EventContext<'_>) -> Option<scenario_state::RelationId> {
    match ctx.event() {
        scenario_state::Event::Relation(r) => Some(r.relation_id),
        _ => None,
    }
}

impl Charm for WebApp {
    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        framework.observe(on::INSTALL, WebApp::on_install);
        framework.observe("configured", WebApp::on_configured);
        framework.observe(on::UPDATE_STATUS, WebApp::on_update_status);
        framework.observe(on::CONFIG_CHANGED, WebApp::on_config_changed);
        framework.observe(on::relation_changed("db"), WebApp::on_db_changed);
        framework.observe(on::pebble_ready("web"), WebApp::on_web_pebble_ready);
        framework.observe(on::action("backup"), WebApp::on_backup_action);
        framework.observe(on::action("refuse"), WebApp::on_refuse_action);
        framework.observe(on::STOP, WebApp::on_stop);
        framework.observe(on::REMOVE, WebApp::on_remove);
        Ok(WebApp::default())
    }
}

/// Reports status only through collect-status.
pub struct Collector;

impl Charm for Collector {
    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        framework.observe(on::COLLECT_UNIT_STATUS, |_: &mut Collector, ctx: &mut EventContext<'_>| {
            ctx.add_status(Status::active(""));
            if ctx.model().relation_ids("db").is_empty() {
                ctx.add_status(Status::blocked("needs a database"));
            }
            Ok(())
        });
        framework.observe(on::COLLECT_APP_STATUS, |_: &mut Collector, ctx: &mut EventContext<'_>| {
            ctx.add_status(Status::waiting("peers settling"));
            Ok(())
        });
        Ok(Collector)
    }
}

pub fn leader() -> State {
    State::new().with_leader(true)
}
