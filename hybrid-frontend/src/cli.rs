use std::path::PathBuf;

use hybrid_config::AppConfig;
use hybrid_core::document::{Entity, EntityId};
use hybrid_core::geometry::Point2;
use hybrid_engine::command::{CommandBus, CommandContext, CommandRequest};
use hybrid_engine::session::Session;
use hybrid_engine::settings::EngineSettings;
use hybrid_engine::sync::InsertOptions;
use hybrid_io::{DocumentSaver, JsonDrawing};
use tracing::{info, warn};

use crate::editor::{GridColumn, VertexGrid};
use crate::errors::FrontendError;
use crate::loader::{DrawingSource, LoadedDrawing, load_drawing};
use crate::settings::engine_settings;

/// 表格编辑命令，由前端自身处理而非命令总线。
pub const EDIT_VERTEX_COMMAND: &str = "edit_vertex";

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub drawing: Option<PathBuf>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub save: Option<PathBuf>,
}

/// 加载图纸、执行一条命令、打印顶点表并按需保存。
pub fn run(options: &CliOptions, config: &AppConfig) -> Result<Session, FrontendError> {
    let settings = engine_settings(config);
    let loaded = load_drawing(options.drawing.as_deref(), config, &settings)?;
    let LoadedDrawing {
        document,
        source,
        demo_polyline,
    } = loaded;

    match &source {
        DrawingSource::File(path) => println!("已加载图纸：{}", path.display()),
        DrawingSource::Demo => {
            if let Some(polyline) = demo_polyline {
                println!("已构建内置示例，多段线 ID = {}", polyline.get());
            }
        }
    }

    let mut session = Session::with_document(document, settings);
    let bus = CommandBus::new();

    if let Some(name) = &options.command {
        let mut args = options.args.clone();
        if args.is_empty() {
            if let Some(polyline) = demo_polyline {
                args.push(polyline.get().to_string());
            }
        }
        if name == EDIT_VERTEX_COMMAND {
            let message = edit_vertex(&mut session, &args)?;
            println!("[命令] {message}");
        } else {
            let request = CommandRequest::new(name.as_str(), args);
            dispatch_cli_command(&bus, &request, &mut session)?;
        }
    } else {
        let mut commands: Vec<&str> = bus.available_commands().copied().collect();
        commands.push(EDIT_VERTEX_COMMAND);
        commands.sort_unstable();
        println!("支持的命令: {}", commands.join(", "));
    }

    print_vertex_tables(&session);

    if let Some(path) = &options.save {
        JsonDrawing::new().save(session.document(), path)?;
        info!(path = %path.display(), "图纸已保存");
        println!("已保存图纸：{}", path.display());
    }
    Ok(session)
}

fn dispatch_cli_command(
    bus: &CommandBus,
    request: &CommandRequest,
    session: &mut Session,
) -> Result<(), FrontendError> {
    let mut context = CommandContext { session };
    let response = bus.dispatch(request, &mut context);
    if response.success {
        if let Some(message) = response.message {
            println!("[命令] {message}");
        }
        Ok(())
    } else {
        let message = response.message.unwrap_or_else(|| "未知错误".to_string());
        warn!(command = %request.name, %message, "CLI 命令执行失败");
        Err(FrontendError::Command {
            name: request.name.clone(),
            message,
        })
    }
}

/// `edit_vertex <polyline> <row> <column> <value> [<x> <y>]`，行号从 1 开始。
///
/// 编辑经表格校验后以 InsertOrUpdate 提交，几何随 N/E 修改而移动。
fn edit_vertex(session: &mut Session, args: &[String]) -> Result<String, FrontendError> {
    let [polyline, row, column, value, rest @ ..] = args else {
        return Err(FrontendError::InvalidArgument(
            "用法: edit_vertex <polyline> <row> <column> <value> [<x> <y>]".to_string(),
        ));
    };
    let polyline = polyline
        .trim()
        .parse::<u64>()
        .map(EntityId::new)
        .map_err(|_| FrontendError::InvalidArgument(format!("`{polyline}` 不是实体句柄")))?;
    let row = row
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|row| row.checked_sub(1))
        .ok_or_else(|| FrontendError::InvalidArgument(format!("`{row}` 不是有效行号")))?;
    let column = GridColumn::parse(column)
        .ok_or_else(|| FrontendError::InvalidArgument(format!("`{column}` 不是有效列名")))?;
    let insert_point = match rest {
        [] => None,
        [x, y] => {
            let x = crate::editor::parse_plain_decimal(x)?;
            let y = crate::editor::parse_plain_decimal(y)?;
            Some(Point2::new(x, y))
        }
        _ => {
            return Err(FrontendError::InvalidArgument(
                "插入点需要两个坐标".to_string(),
            ));
        }
    };

    let records = session.load_vertices(polyline)?;
    let mut grid = VertexGrid::new(records, grid_decimals(session.settings()));
    grid.set_cell(row, column, value)?;
    let options = InsertOptions {
        place_classification: session.settings().markers.place_classification,
        insert_point,
    };
    let summary = session.insert_or_update(polyline, grid.into_records(), options)?;
    Ok(summary.to_string())
}

fn grid_decimals(settings: &EngineSettings) -> usize {
    settings.payload_decimals as usize
}

fn print_vertex_tables(session: &Session) {
    let key = session.synchronizer().store().key();
    let polylines: Vec<EntityId> = session
        .document()
        .entities()
        .filter(|(id, entity)| {
            matches!(entity, Entity::Polyline(_))
                && session.document().extension(*id, key).is_some()
        })
        .map(|(id, _)| id)
        .collect();

    if polylines.is_empty() {
        println!("图纸中没有带顶点元数据的多段线。");
        return;
    }
    for polyline in polylines {
        match session.load_vertices(polyline) {
            Ok(records) => {
                let grid = VertexGrid::new(records, grid_decimals(session.settings()));
                println!("多段线 #{}，顶点数={}", polyline.get(), grid.len());
                println!("  {}", VertexGrid::header().join(" | "));
                for row in grid.rows() {
                    println!("  {}", row.join(" | "));
                }
            }
            Err(err) => warn!(polyline = polyline.get(), error = %err, "读取顶点失败"),
        }
    }
}
