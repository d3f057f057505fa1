use anyhow::{anyhow, bail, Context};
use evidence_curator_core::{
    AnnotationSession, Direction, GroupingMode, PageCatalog, PageId, RelevanceGrade,
};

/// One authoring step, as typed on the command line (`add 12`, `score 120 2`).
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Add(PageId),
    Remove(PageId),
    Toggle(PageId),
    Score(i64, RelevanceGrade),
    Mode(GroupingMode),
    Merge(usize, PageId),
    Split(PageId),
    RemoveGroup(usize),
    MoveGroup(usize, usize),
    Clear,
    Focus(PageId),
    Next,
    Prev,
    Unfocus,
    Question(String),
}

impl std::str::FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (verb, rest) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        let op = match verb.to_lowercase().as_str() {
            "add" => Op::Add(int_arg(&args, 0, raw)?),
            "remove" => Op::Remove(int_arg(&args, 0, raw)?),
            "toggle" => Op::Toggle(int_arg(&args, 0, raw)?),
            "score" => {
                let grade: i32 = int_arg(&args, 1, raw)?;
                Op::Score(int_arg(&args, 0, raw)?, RelevanceGrade::try_from(grade)?)
            }
            "mode" => Op::Mode(
                args.first()
                    .ok_or_else(|| anyhow!("missing grouping mode in `{raw}`"))?
                    .parse::<GroupingMode>()?,
            ),
            "merge" => Op::Merge(int_arg(&args, 0, raw)?, int_arg(&args, 1, raw)?),
            "split" => Op::Split(int_arg(&args, 0, raw)?),
            "remove-group" => Op::RemoveGroup(int_arg(&args, 0, raw)?),
            "move-group" => Op::MoveGroup(int_arg(&args, 0, raw)?, int_arg(&args, 1, raw)?),
            "clear" => Op::Clear,
            "focus" => Op::Focus(int_arg(&args, 0, raw)?),
            "next" => Op::Next,
            "prev" => Op::Prev,
            "unfocus" => Op::Unfocus,
            "question" => {
                if rest.trim().is_empty() {
                    bail!("missing question text in `{raw}`");
                }
                Op::Question(rest.trim().to_string())
            }
            other => bail!("unknown operation `{other}`"),
        };
        Ok(op)
    }
}

fn int_arg<T>(args: &[&str], index: usize, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    args.get(index)
        .ok_or_else(|| anyhow!("missing argument {} in `{raw}`", index + 1))?
        .parse()
        .with_context(|| format!("bad argument {} in `{raw}`", index + 1))
}

pub fn apply(session: &mut AnnotationSession, catalog: &impl PageCatalog, op: &Op) {
    let evidence = &mut session.evidence;
    match op {
        Op::Add(page_id) => evidence.add_evidence(*page_id, catalog),
        Op::Remove(page_id) => evidence.remove_evidence(*page_id),
        Op::Toggle(page_id) => evidence.toggle_evidence(*page_id, catalog),
        Op::Score(chunk_id, grade) => evidence.set_chunk_score(*chunk_id, grade.score()),
        Op::Mode(mode) => evidence.set_grouping_mode(*mode),
        Op::Merge(index, page_id) => evidence.merge_into_group(*index, *page_id),
        Op::Split(page_id) => evidence.split_to_new_group(*page_id),
        Op::RemoveGroup(index) => evidence.remove_group(*index),
        Op::MoveGroup(from, to) => evidence.move_group(*from, *to),
        Op::Clear => evidence.clear_evidence(),
        Op::Focus(page_id) => session.focus.focus(*page_id),
        Op::Next => {
            session
                .focus
                .focus_adjacent(Direction::Forward, catalog.current_pages());
        }
        Op::Prev => {
            session
                .focus
                .focus_adjacent(Direction::Backward, catalog.current_pages());
        }
        Op::Unfocus => session.focus.clear_focus(),
        Op::Question(text) => session.query.contents = text.clone(),
    }
}
