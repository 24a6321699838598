use std::collections::HashMap;

use hybrid_core::document::EntityId;
use hybrid_core::geometry::Point2;

use crate::errors::EngineError;
use crate::session::Session;
use crate::sync::InsertOptions;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    fn from_result<T: ToString>(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(summary) => Self::ok(summary.to_string()),
            Err(err) => Self::err(err.to_string()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddNumberingCommand);
        bus.register(UpdateNumberingCommand);
        bus.register(InsertOrUpdateCommand);
        bus.register(TransferMetadataCommand);
        bus.register(RebuildFromReportCommand);
        bus.register(PurgeMetadataCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    /// 执行命令；放行名单中的命令在执行期间暂停编辑守卫。
    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.session.command_will_start(&request.name);
        let response = if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        };
        context.session.command_ended(&request.name);
        response
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

/// 取第 `index` 个参数作为实体句柄；缺失等同于用户取消拾取。
fn entity_arg(request: &CommandRequest, index: usize) -> Result<EntityId, EngineError> {
    let Some(raw) = request.args.get(index) else {
        return Err(EngineError::Cancelled("no entity selected"));
    };
    raw.trim()
        .parse::<u64>()
        .map(EntityId::new)
        .map_err(|_| EngineError::Cancelled("entity handle is not a number"))
}

struct AddNumberingCommand;

impl CommandHandler for AddNumberingCommand {
    fn name(&self) -> &'static str {
        "add_numbering"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            entity_arg(request, 0).and_then(|polyline| context.session.add_numbering(polyline)),
        )
    }
}

struct UpdateNumberingCommand;

impl CommandHandler for UpdateNumberingCommand {
    fn name(&self) -> &'static str {
        "update_numbering"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            entity_arg(request, 0).and_then(|polyline| context.session.update_numbering(polyline)),
        )
    }
}

/// `insert_or_update <polyline> [<x> <y>] [classify]`：以当前元数据刷新报表。
struct InsertOrUpdateCommand;

impl InsertOrUpdateCommand {
    fn options(request: &CommandRequest) -> Result<InsertOptions, EngineError> {
        let mut options = InsertOptions::default();
        let mut numbers = Vec::new();
        for arg in request.args.iter().skip(1) {
            if arg.eq_ignore_ascii_case("classify") {
                options.place_classification = true;
            } else {
                let value = arg
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| EngineError::Cancelled("insertion point is not numeric"))?;
                numbers.push(value);
            }
        }
        options.insert_point = match numbers.as_slice() {
            [] => None,
            [x, y] => Some(Point2::new(*x, *y)),
            _ => return Err(EngineError::Cancelled("insertion point needs two coordinates")),
        };
        Ok(options)
    }
}

impl CommandHandler for InsertOrUpdateCommand {
    fn name(&self) -> &'static str {
        "insert_or_update"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = entity_arg(request, 0).and_then(|polyline| {
            let options = Self::options(request)?;
            let records = context.session.load_vertices(polyline)?;
            context.session.insert_or_update(polyline, records, options)
        });
        CommandResponse::from_result(result)
    }
}

struct TransferMetadataCommand;

impl CommandHandler for TransferMetadataCommand {
    fn name(&self) -> &'static str {
        "transfer_metadata"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = entity_arg(request, 0).and_then(|source| {
            let target = entity_arg(request, 1)?;
            context.session.transfer_metadata(source, target)
        });
        CommandResponse::from_result(result)
    }
}

struct RebuildFromReportCommand;

impl CommandHandler for RebuildFromReportCommand {
    fn name(&self) -> &'static str {
        "rebuild_from_report"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            entity_arg(request, 0).and_then(|report| context.session.rebuild_from_report(report)),
        )
    }
}

struct PurgeMetadataCommand;

impl CommandHandler for PurgeMetadataCommand {
    fn name(&self) -> &'static str {
        "purge_metadata"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            entity_arg(request, 0).and_then(|polyline| context.session.purge_metadata(polyline)),
        )
    }
}
