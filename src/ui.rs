use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Margin, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{BoardConfig, HELP_TEXT};
use crate::model::{Model, Modus, UIData};

pub const CMDLINE_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;
const COLUMN_SPACING: u16 = 1;
const HEADER_BG: Color = Color::Rgb(22, 119, 199);

pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, main_area, status_area, cmd_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(STATUSLINE_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(Self::title(uidata), title_area);

        match uidata.modus {
            Modus::Login => Self::draw_login(uidata, frame, main_area),
            Modus::Record => Self::draw_record(uidata, frame, main_area),
            Modus::Table | Modus::CmdInput | Modus::Popup => {
                self.draw_table(uidata, frame, main_area)
            }
        }

        frame.render_widget(Self::status_line(uidata), status_area);
        Self::draw_cmdline(uidata, frame, cmd_area);

        if uidata.show_popup {
            Self::draw_popup(uidata, frame, main_area);
        }
    }

    fn title(uidata: &UIData) -> Line<'static> {
        let mut spans = vec![" Mayan EDMS ".bold().on_blue(), " Tableau des documents".into()];
        if let Some(user) = &uidata.username {
            spans.push(format!("  [{user}]").dim());
        }
        if uidata.loading {
            spans.push("  chargement…".yellow());
        }
        Line::from(spans)
    }

    fn draw_login(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(" Connexion ".bold()).centered())
            .border_set(border::THICK);
        let text = Text::from(vec![
            Line::from(""),
            Line::from("Identifiez-vous avec votre compte Mayan EDMS."),
            Line::from(""),
            Line::from(vec!["Enter".blue().bold(), " valider   ".into(), "Esc".blue().bold(), " retour / quitter".into()]),
        ]);
        let form = popup_area(area, 60, 40);
        frame.render_widget(Clear, form);
        frame.render_widget(Paragraph::new(text).centered().block(block), form);

        if !uidata.status_message.is_empty() {
            let [_, message_area] = Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(form);
            frame.render_widget(
                Line::from(uidata.status_message.clone().red()).centered(),
                message_area.inner(Margin::new(1, 0)),
            );
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let widths = self.column_widths(uidata);

        let header = Row::new(uidata.headers.iter().map(|h| Cell::from(h.clone())))
            .style(Style::new().fg(Color::White).bg(HEADER_BG).add_modifier(Modifier::BOLD));

        let rows = uidata.rows.iter().enumerate().map(|(idx, row)| {
            let mut style = if idx % 2 == 1 {
                Style::new().bg(Color::Rgb(40, 40, 40))
            } else {
                Style::new()
            };
            if row.expired {
                style = style.fg(Color::Red);
            }
            Row::new(row.cells.iter().map(|c| Cell::from(c.clone()))).style(style)
        });

        let block = Block::bordered()
            .title(Line::from(format!(
                " page {}/{} ",
                uidata.page, uidata.page_count
            )))
            .title_bottom(
                Line::from(vec![
                    " Aide ".into(),
                    "<?>".blue().bold(),
                    " Quitter ".into(),
                    "<q> ".blue().bold(),
                ])
                .centered(),
            );

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .column_highlight_style(Style::new().add_modifier(Modifier::BOLD))
            .cell_highlight_style(Style::new().fg(Color::Yellow).add_modifier(Modifier::REVERSED));

        let mut state = TableState::default()
            .with_selected(if uidata.rows.is_empty() { None } else { Some(uidata.selected_row) })
            .with_selected_column(Some(uidata.selected_column));

        if uidata.rows.is_empty() {
            let empty = Paragraph::new("Aucun document").centered();
            let [_, body] = Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(area);
            frame.render_stateful_widget(table, area, &mut state);
            frame.render_widget(empty, body);
        } else {
            frame.render_stateful_widget(table, area, &mut state);
        }
    }

    fn column_widths(&self, uidata: &UIData) -> Vec<Constraint> {
        (0..uidata.headers.len())
            .map(|idx| {
                let widest = uidata
                    .rows
                    .iter()
                    .filter_map(|r| r.cells.get(idx))
                    .chain(std::iter::once(&uidata.headers[idx]))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(1);
                Constraint::Length(widest.min(self.max_column_width) as u16)
            })
            .collect()
    }

    fn draw_record(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let key_width = uidata
            .record
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(0) as u16;

        let rows = uidata
            .record
            .iter()
            .skip(uidata.record_offset)
            .map(|(k, v)| Row::new(vec![Cell::from(k.clone().bold()), Cell::from(v.clone())]));

        let table = Table::new(rows, [Constraint::Length(key_width), Constraint::Fill(1)])
            .block(Block::bordered().title(" Document ").title_bottom(
                Line::from(vec![
                    " Précédent/Suivant ".into(),
                    "<←/→>".blue().bold(),
                    " Retour ".into(),
                    "<Esc> ".blue().bold(),
                ])
                .centered(),
            ))
            .column_spacing(2);
        frame.render_widget(table, area);
    }

    fn status_line(uidata: &UIData) -> Line<'static> {
        let mut spans = vec![
            Span::from(format!(" {}/{} lignes ", uidata.nrows, uidata.total_rows)).reversed(),
            Span::from(if uidata.include_expired {
                " export: expirés inclus "
            } else {
                " export: expirés exclus "
            })
            .dim(),
        ];
        if !uidata.filter_summary.is_empty() {
            spans.push(Span::from(format!(" {} ", uidata.filter_summary)).cyan());
        }
        if uidata.modus != Modus::Login {
            spans.push(Span::from(format!(" {}", uidata.status_message)));
        }
        Line::from(spans)
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if !uidata.active_cmdinput {
            return;
        }
        let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or(":");
        let line = Line::from(vec![prompt.bold(), uidata.cmdinput.display().into()]);
        frame.render_widget(line, area);

        let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
    }

    fn draw_popup(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let popup = popup_area(area, 70, 80);
        let title = if uidata.popup_message == HELP_TEXT { " Aide " } else { " Erreur " };
        let block = Block::bordered()
            .title(Line::from(title.bold()).centered())
            .title_bottom(Line::from(" <Esc> ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone())
                .wrap(Wrap { trim: false })
                .block(block),
            popup,
        );
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
