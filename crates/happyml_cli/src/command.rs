//! The command DSL's AST and recursive-descent parser (spec §6). Parses a
//! line already split into tokens by [`crate::lexer::tokenize`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    Given,
    Expected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Label,
    Number,
    Text,
    Image,
}

impl DataType {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "label" => Some(DataType::Label),
            "number" => Some(DataType::Number),
            "text" => Some(DataType::Text),
            "image" => Some(DataType::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub use_: Use,
    pub data_type: DataType,
    pub shape: Option<(usize, usize, usize)>,
    pub column_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Speed,
    Accuracy,
    Memory,
}

impl Goal {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "speed" => Some(Goal::Speed),
            "accuracy" => Some(Goal::Accuracy),
            "memory" => Some(Goal::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    Raw,
    Pretty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteSource {
    Dataset(String),
    Input(Vec<(String, Vec<String>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateDataset {
        name: String,
        has_header: bool,
        columns: Vec<ColumnSpec>,
        location: String,
    },
    CreateTask {
        name: String,
        goal: Option<Goal>,
        test_dataset: Option<String>,
        dataset: String,
    },
    ExecuteTask {
        name: String,
        label: Option<String>,
        source: ExecuteSource,
    },
    Print {
        mode: PrintMode,
        dataset: String,
        limit: Option<usize>,
    },
    Help(Option<String>),
    Exit,
}

struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [String]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Result<&'a str, String> {
        let tok = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| "unexpected end of command".to_string())?;
        self.pos += 1;
        Ok(tok.as_str())
    }

    fn expect(&mut self, word: &str) -> Result<(), String> {
        let tok = self.next()?;
        if tok.eq_ignore_ascii_case(word) {
            Ok(())
        } else {
            Err(format!("expected '{word}', found '{tok}'"))
        }
    }

    fn eat(&mut self, word: &str) -> bool {
        if self.peek().map(|t| t.eq_ignore_ascii_case(word)).unwrap_or(false) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next_usize(&mut self) -> Result<usize, String> {
        let tok = self.next()?;
        tok.parse().map_err(|_| format!("expected a number, found '{tok}'"))
    }
}

/// Parse one already-tokenized command line. `tokens` must be non-empty.
pub fn parse(tokens: &[String]) -> Result<Command, String> {
    let mut cur = Cursor::new(tokens);
    let keyword = cur.next()?.to_ascii_lowercase();
    match keyword.as_str() {
        "create" => parse_create(&mut cur),
        "execute" => parse_execute(&mut cur),
        "print" => parse_print(&mut cur),
        "help" => Ok(Command::Help(cur.peek().map(|s| s.to_string()))),
        "exit" | "quit" => Ok(Command::Exit),
        other => Err(format!("unknown command '{other}'")),
    }
}

fn parse_create(cur: &mut Cursor) -> Result<Command, String> {
    match cur.next()?.to_ascii_lowercase().as_str() {
        "dataset" => parse_create_dataset(cur),
        "task" => parse_create_task(cur),
        other => Err(format!("expected 'dataset' or 'task' after 'create', found '{other}'")),
    }
}

fn parse_create_dataset(cur: &mut Cursor) -> Result<Command, String> {
    let name = cur.next()?.to_string();
    let mut has_header = false;
    let mut columns = Vec::new();

    loop {
        if !cur.eat("with") {
            break;
        }
        if cur.eat("header") {
            has_header = true;
            continue;
        }
        let use_ = match cur.next()?.to_ascii_lowercase().as_str() {
            "given" => Use::Given,
            "expected" => Use::Expected,
            other => return Err(format!("expected 'given' or 'expected', found '{other}'")),
        };
        let data_type_word = cur.next()?.to_ascii_lowercase();
        let data_type = DataType::parse(&data_type_word)
            .ok_or_else(|| format!("unknown column data type '{data_type_word}'"))?;

        let shape = if cur.peek() == Some("(") {
            cur.expect("(")?;
            let rows = cur.next_usize()?;
            cur.expect(",")?;
            let columns = cur.next_usize()?;
            cur.expect(",")?;
            let channels = cur.next_usize()?;
            cur.expect(")")?;
            Some((rows, columns, channels))
        } else {
            None
        };

        cur.expect("at")?;
        let column_index = cur.next_usize()?;
        columns.push(ColumnSpec {
            use_,
            data_type,
            shape,
            column_index,
        });
    }

    cur.expect("using")?;
    let location = cur.next()?.to_string();

    if cur.peek().is_some() {
        return Err(format!("unexpected trailing token '{}'", cur.peek().unwrap()));
    }

    Ok(Command::CreateDataset {
        name,
        has_header,
        columns,
        location,
    })
}

fn parse_create_task(cur: &mut Cursor) -> Result<Command, String> {
    let task_type = cur.next()?.to_ascii_lowercase();
    if task_type != "label" {
        return Err(format!("unsupported task type '{task_type}' (only 'label' is supported)"));
    }
    let name = cur.next()?.to_string();
    let mut goal = None;
    let mut test_dataset = None;

    loop {
        if !cur.eat("with") {
            break;
        }
        match cur.next()?.to_ascii_lowercase().as_str() {
            "goal" => {
                let word = cur.next()?.to_ascii_lowercase();
                goal = Some(Goal::parse(&word).ok_or_else(|| format!("unknown goal '{word}'"))?);
            }
            "test" => {
                test_dataset = Some(cur.next()?.to_string());
            }
            other => return Err(format!("expected 'goal' or 'test' after 'with', found '{other}'")),
        }
    }

    cur.expect("using")?;
    let dataset = cur.next()?.to_string();

    if cur.peek().is_some() {
        return Err(format!("unexpected trailing token '{}'", cur.peek().unwrap()));
    }

    Ok(Command::CreateTask {
        name,
        goal,
        test_dataset,
        dataset,
    })
}

fn parse_execute(cur: &mut Cursor) -> Result<Command, String> {
    cur.expect("task")?;
    let name = cur.next()?.to_string();
    let mut label = None;
    if cur.eat("with") {
        cur.expect("label")?;
        label = Some(cur.next()?.to_string());
    }
    cur.expect("using")?;
    let source = match cur.next()?.to_ascii_lowercase().as_str() {
        "dataset" => ExecuteSource::Dataset(cur.next()?.to_string()),
        "input" => ExecuteSource::Input(parse_input_map(cur)?),
        other => return Err(format!("expected 'dataset' or 'input' after 'using', found '{other}'")),
    };

    if cur.peek().is_some() {
        return Err(format!("unexpected trailing token '{}'", cur.peek().unwrap()));
    }

    Ok(Command::ExecuteTask { name, label, source })
}

fn parse_input_map(cur: &mut Cursor) -> Result<Vec<(String, Vec<String>)>, String> {
    cur.expect("(")?;
    let mut entries = Vec::new();
    loop {
        if cur.peek() == Some(")") {
            break;
        }
        let key = cur.next()?.to_string();
        cur.expect(":")?;
        let values = if cur.peek() == Some("[") {
            cur.expect("[")?;
            let mut items = Vec::new();
            loop {
                if cur.peek() == Some("]") {
                    break;
                }
                items.push(cur.next()?.to_string());
                if !cur.eat(",") {
                    break;
                }
            }
            cur.expect("]")?;
            items
        } else {
            vec![cur.next()?.to_string()]
        };
        entries.push((key, values));
        if !cur.eat(",") {
            break;
        }
    }
    cur.expect(")")?;
    Ok(entries)
}

fn parse_print(cur: &mut Cursor) -> Result<Command, String> {
    let mode = match cur.next()?.to_ascii_lowercase().as_str() {
        "raw" => PrintMode::Raw,
        "pretty" => PrintMode::Pretty,
        other => return Err(format!("expected 'raw' or 'pretty', found '{other}'")),
    };
    let dataset = cur.next()?.to_string();
    let limit = if cur.eat("limit") { Some(cur.next_usize()?) } else { None };

    if cur.peek().is_some() {
        return Err(format!("unexpected trailing token '{}'", cur.peek().unwrap()));
    }

    Ok(Command::Print { mode, dataset, limit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_line(line: &str) -> Command {
        parse(&tokenize(line).unwrap()).unwrap()
    }

    #[test]
    fn create_dataset_with_two_column_groups() {
        let cmd = parse_line(
            "create dataset xor with header with given number (1, 2, 1) at 0 with expected number at 2 using file://xor.csv",
        );
        match cmd {
            Command::CreateDataset { name, has_header, columns, location } => {
                assert_eq!(name, "xor");
                assert!(has_header);
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].use_, Use::Given);
                assert_eq!(columns[0].shape, Some((1, 2, 1)));
                assert_eq!(columns[1].use_, Use::Expected);
                assert_eq!(columns[1].shape, None);
                assert_eq!(location, "file://xor.csv");
            }
            other => panic!("expected CreateDataset, got {other:?}"),
        }
    }

    #[test]
    fn create_task_requires_the_label_keyword() {
        let err = parse(&tokenize("create task number my_task using xor").unwrap()).unwrap_err();
        assert!(err.contains("unsupported task type"));
    }

    #[test]
    fn create_task_with_goal_and_test() {
        let cmd = parse_line("create task label xor_model with goal accuracy with test xor_test using xor");
        match cmd {
            Command::CreateTask { name, goal, test_dataset, dataset } => {
                assert_eq!(name, "xor_model");
                assert_eq!(goal, Some(Goal::Accuracy));
                assert_eq!(test_dataset, Some("xor_test".to_string()));
                assert_eq!(dataset, "xor");
            }
            other => panic!("expected CreateTask, got {other:?}"),
        }
    }

    #[test]
    fn execute_task_using_a_dataset() {
        let cmd = parse_line("execute task xor_model using dataset xor");
        assert_eq!(
            cmd,
            Command::ExecuteTask {
                name: "xor_model".into(),
                label: None,
                source: ExecuteSource::Dataset("xor".into()),
            }
        );
    }

    #[test]
    fn execute_task_using_inline_input_with_a_list_value() {
        let cmd = parse_line(r#"execute task xor_model using input ("xy": [0, 1])"#);
        match cmd {
            Command::ExecuteTask { source: ExecuteSource::Input(entries), .. } => {
                assert_eq!(entries, vec![("xy".to_string(), vec!["0".to_string(), "1".to_string()])]);
            }
            other => panic!("expected ExecuteTask with Input, got {other:?}"),
        }
    }

    #[test]
    fn print_with_limit() {
        let cmd = parse_line("print pretty xor limit 5");
        assert_eq!(
            cmd,
            Command::Print {
                mode: PrintMode::Pretty,
                dataset: "xor".into(),
                limit: Some(5),
            }
        );
    }

    #[test]
    fn exit_and_help() {
        assert_eq!(parse_line("exit"), Command::Exit);
        assert_eq!(parse_line("help dataset"), Command::Help(Some("dataset".into())));
    }
}
