use std::cell::Cell;

use mesh::{
    Context, Declare, Declarator, Dep, DepOptions, Error, Link, Managed, Mesh, Service, Shared,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

trait Logger {
    fn log(&self, message: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        info!(target: "app", "{}", message);
    }
}

impl Managed for ConsoleLogger {}
impl Declare for ConsoleLogger {}
impl Service for ConsoleLogger {
    fn construct(_ctx: &Context) -> Result<Self, Error> {
        Ok(ConsoleLogger)
    }
}

struct Database {
    link: Link,
    logger: Dep<dyn Logger>,
    connected: Cell<bool>,
}

impl Database {
    fn connect(&self) -> Result<(), Error> {
        self.logger.get()?.log("Connected to database");
        self.connected.set(true);
        Ok(())
    }
}

impl Managed for Database {
    fn link(&self) -> Option<&Link> {
        Some(&self.link)
    }
}

impl Declare for Database {
    fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
        decl.field::<dyn Logger>("logger")?
            .handler("start", Database::connect);
        Ok(())
    }
}

impl Service for Database {
    fn construct(ctx: &Context) -> Result<Self, Error> {
        Ok(Self {
            link: ctx.link(),
            logger: ctx.dep("logger")?,
            connected: Cell::new(false),
        })
    }
}

struct UserRepository {
    link: Link,
    database: Dep<Database>,
    session_id: Dep<String>,
    audit: Dep<String>,
}

impl UserRepository {
    fn describe(&self) -> Result<String, Error> {
        let audit = self
            .audit
            .resolve()?
            .map(|audit| audit.to_string())
            .unwrap_or_else(|| "off".to_string());
        Ok(format!(
            "session {} (database connected: {}, audit: {})",
            self.session_id.get()?,
            self.database.get()?.connected.get(),
            audit
        ))
    }
}

impl Managed for UserRepository {
    fn link(&self) -> Option<&Link> {
        Some(&self.link)
    }
}

impl Declare for UserRepository {
    fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
        decl.field::<Database>("database")?
            .field_with::<String>("session_id", DepOptions::new().key("SessionId"))?
            .field_with::<String>("audit", DepOptions::new().key("Audit").optional())?;
        Ok(())
    }
}

impl Service for UserRepository {
    fn construct(ctx: &Context) -> Result<Self, Error> {
        Ok(Self {
            link: ctx.link(),
            database: ctx.dep("database")?,
            session_id: ctx.dep("session_id")?,
            audit: ctx.dep("audit")?,
        })
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app = Mesh::new("app");
    app.service_as::<dyn Logger, ConsoleLogger, _>(|logger| logger as Shared<dyn Logger>)?
        .service::<Database>()?;
    let request_scope = app.scope("request")?;
    request_scope.service::<UserRepository>()?;
    app.bind_scope("request", request_scope.factory("request"))?;

    for missing in app.missing_deps()? {
        info!("Unbound dependency {}.{} -> \"{}\"", missing.owner, missing.field, missing.key);
    }

    let started = app.invoke_handlers("start", true)?;
    info!("Ran {} start handler(s)", started);

    let provider = app.provider("request")?;
    for session in ["alice", "bob"] {
        let request = provider.provide(None)?;
        request.constant("SessionId", session.to_string())?;

        let repository = request.resolve_type::<UserRepository>()?;
        info!("Mesh \"{}\": {}", request.name(), repository.describe()?);
    }

    Ok(())
}
