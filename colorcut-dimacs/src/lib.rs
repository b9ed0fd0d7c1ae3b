//! DIMACS edge format parser and writer for the colorcut graph coloring solver.
//!
//! The format consists of comment lines starting with `c`, a single header line `p edge <n> <m>`
//! declaring the vertex and edge counts and one line `e <u> <v>` per edge. Vertices are 1-based.

use std::io;

use colorcut_graph::{Graph, GraphError, Vertex};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing a graph in DIMACS edge format.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {}: Unexpected input in DIMACS edge format: '{}'", line, unexpected)]
    UnexpectedInput { line: usize, unexpected: String },
    #[error("line {}: Invalid header syntax: {}", line, header)]
    InvalidHeader { line: usize, header: String },
    #[error("line {}: Second header line", line)]
    DuplicateHeader { line: usize },
    #[error("line {}: Edge listed before the 'p edge' header", line)]
    MissingHeader { line: usize },
    #[error("line {}: Invalid edge syntax: {}", line, edge)]
    InvalidEdge { line: usize, edge: String },
    #[error(
        "line {}: Vertex {} is out of range, the header specifies {} vertices",
        line,
        vertex,
        vertex_count
    )]
    VertexOutOfRange {
        line: usize,
        vertex: usize,
        vertex_count: usize,
    },
    #[error("line {}: Self loop at vertex {}", line, vertex)]
    SelfLoop { line: usize, vertex: usize },
    #[error(
        "line {}: Header specifies {} vertices, at most {} are supported",
        line,
        vertex_count,
        max
    )]
    TooManyVertices {
        line: usize,
        vertex_count: usize,
        max: usize,
    },
    #[error(
        "Graph has {} edges while the header specifies {} edges",
        edge_count,
        header_edge_count
    )]
    EdgeCount {
        edge_count: usize,
        header_edge_count: usize,
    },
    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),
    #[error("Parser invoked after a previous error")]
    PreviousError,
}

/// Vertex and edge count present in a DIMACS edge format header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DimacsHeader {
    pub vertex_count: usize,
    pub edge_count: usize,
}

/// Parser for graphs in DIMACS edge format.
///
/// This parser can consume the input in chunks. The header has to precede all edges, so that
/// every edge can be checked against the declared vertex count as soon as it is read.
#[derive(Default)]
pub struct DimacsGraphParser {
    header: Option<DimacsHeader>,
    edges: Vec<(Vertex, Vertex)>,

    line: Vec<u8>,
    line_number: usize,
    error: bool,
}

impl DimacsGraphParser {
    /// Create a new DIMACS edge format parser.
    pub fn new() -> DimacsGraphParser {
        DimacsGraphParser {
            line_number: 1,
            ..DimacsGraphParser::default()
        }
    }

    /// Parse the given input, check the header and build the graph.
    pub fn parse(input: impl io::Read) -> Result<Graph, Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);
        }
        parser.eof()?;
        parser.check_header()?;

        Ok(parser.into_graph()?)
    }

    /// Parse a chunk of input.
    ///
    /// After parsing the last chunk call the [`eof`](DimacsGraphParser::eof) method.
    ///
    /// If this method returns an error, the parser is in an invalid state and cannot parse further
    /// chunks.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        if self.error {
            return Err(ParseError::PreviousError);
        }
        for &byte in chunk.iter() {
            if byte == b'\n' {
                self.finish_line()?;
                self.line_number += 1;
            } else {
                self.line.push(byte);
            }
        }
        Ok(())
    }

    /// Finish parsing the input.
    ///
    /// This does not check whether the header information was correct, call
    /// [`check_header`](DimacsGraphParser::check_header) for this.
    pub fn eof(&mut self) -> Result<(), ParseError> {
        if self.error {
            return Err(ParseError::PreviousError);
        }
        self.finish_line()
    }

    /// Verifies that a header was present and matches the parsed edges.
    pub fn check_header(&self) -> Result<(), ParseError> {
        let header = match self.header {
            Some(header) => header,
            None => {
                return Err(ParseError::MissingHeader {
                    line: self.line_number,
                })
            }
        };

        if self.edges.len() != header.edge_count {
            return Err(ParseError::EdgeCount {
                edge_count: self.edges.len(),
                header_edge_count: header.edge_count,
            });
        }

        Ok(())
    }

    /// Return the DIMACS header data if present.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of edge lines parsed, including repeated edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Build the parsed graph.
    ///
    /// Call [`check_header`](DimacsGraphParser::check_header) first to detect inconsistent input.
    pub fn into_graph(self) -> Result<Graph, ParseError> {
        let vertex_count = self.header.map_or(0, |header| header.vertex_count);
        Ok(Graph::new(vertex_count, self.edges)?)
    }

    fn finish_line(&mut self) -> Result<(), ParseError> {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        let result = self.parse_line(&line);
        if result.is_err() {
            self.error = true;
        }
        result
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut tokens = line.split_ascii_whitespace();
        let first = match tokens.next() {
            None => return Ok(()),
            Some(first) => first,
        };

        match first {
            _ if first.starts_with('c') => Ok(()),
            "p" => self.parse_header_line(line, tokens),
            "e" => self.parse_edge_line(line, tokens),
            _ => Err(ParseError::UnexpectedInput {
                line: self.line_number,
                unexpected: first.to_owned(),
            }),
        }
    }

    fn parse_header_line<'a>(
        &mut self,
        line: &str,
        mut values: impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        if self.header.is_some() {
            return Err(ParseError::DuplicateHeader {
                line: self.line_number,
            });
        }

        let line_number = self.line_number;
        let invalid_header = || ParseError::InvalidHeader {
            line: line_number,
            header: line.trim().to_owned(),
        };

        match values.next() {
            Some("edge") | Some("col") => (),
            _ => return Err(invalid_header()),
        }

        let vertex_count: usize = values
            .next()
            .and_then(|value| str::parse(value).ok())
            .ok_or_else(invalid_header)?;
        let edge_count: usize = values
            .next()
            .and_then(|value| str::parse(value).ok())
            .ok_or_else(invalid_header)?;

        if values.next().is_some() {
            return Err(invalid_header());
        }

        if vertex_count > Vertex::max_count() {
            return Err(ParseError::TooManyVertices {
                line: line_number,
                vertex_count,
                max: Vertex::max_count(),
            });
        }

        self.header = Some(DimacsHeader {
            vertex_count,
            edge_count,
        });

        Ok(())
    }

    fn parse_edge_line<'a>(
        &mut self,
        line: &str,
        mut values: impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        let header = self.header.ok_or(ParseError::MissingHeader {
            line: self.line_number,
        })?;

        let line_number = self.line_number;
        let invalid_edge = || ParseError::InvalidEdge {
            line: line_number,
            edge: line.trim().to_owned(),
        };

        let mut endpoints = [0usize; 2];
        for endpoint in endpoints.iter_mut() {
            *endpoint = values
                .next()
                .and_then(|value| str::parse(value).ok())
                .ok_or_else(invalid_edge)?;
        }

        if values.next().is_some() {
            return Err(invalid_edge());
        }

        for &vertex in endpoints.iter() {
            if vertex == 0 || vertex > header.vertex_count {
                return Err(ParseError::VertexOutOfRange {
                    line: line_number,
                    vertex,
                    vertex_count: header.vertex_count,
                });
            }
        }

        let [a, b] = endpoints;
        if a == b {
            return Err(ParseError::SelfLoop {
                line: line_number,
                vertex: a,
            });
        }

        self.edges
            .push((Vertex::from_dimacs(a), Vertex::from_dimacs(b)));

        Ok(())
    }
}

/// Write a DIMACS edge format header.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p edge {vertex_count} {edge_count}",
        vertex_count = header.vertex_count,
        edge_count = header.edge_count
    )
}

/// Write a list of edges as headerless DIMACS edge lines.
pub fn write_dimacs_edges(
    target: &mut impl io::Write,
    edges: impl IntoIterator<Item = (Vertex, Vertex)>,
) -> io::Result<()> {
    for (a, b) in edges {
        target.write_all(b"e ")?;
        itoa::write(&mut *target, a.to_dimacs())?;
        target.write_all(b" ")?;
        itoa::write(&mut *target, b.to_dimacs())?;
        target.write_all(b"\n")?;
    }
    Ok(())
}

/// Write a graph in DIMACS edge format.
pub fn write_dimacs_graph(target: &mut impl io::Write, graph: &Graph) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            vertex_count: graph.vertex_count(),
            edge_count: graph.edge_count(),
        },
    )?;
    write_dimacs_edges(&mut *target, graph.edges().iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Error;
    use proptest::{test_runner::TestCaseError, *};

    use colorcut_graph::{graph, graph::strategy::*, vertex};

    #[test]
    fn odd_whitespace() -> Result<(), Error> {
        let parsed = DimacsGraphParser::parse(
            b"c a square\np  edge  4   4  \r\n e 1 2\n\ne 2   3\nccomment\ne 3 4\ne 4 1" as &[_],
        )?;

        let expected = graph![4; 1, 2; 2, 3; 3, 4; 4, 1];

        assert_eq!(parsed, expected);

        Ok(())
    }

    #[test]
    fn repeated_edges_count_towards_the_header() -> Result<(), Error> {
        let parsed = DimacsGraphParser::parse(b"p edge 3 3\ne 1 2\ne 2 1\ne 2 3\n" as &[_])?;

        assert_eq!(parsed.edge_count(), 2);
        assert!(parsed.adjacent(vertex!(1), vertex!(2)));
        assert!(parsed.adjacent(vertex!(3), vertex!(2)));

        Ok(())
    }

    #[test]
    fn col_header_and_isolated_vertices() -> Result<(), Error> {
        let parsed = DimacsGraphParser::parse(b"p col 5 0\n" as &[_])?;

        assert_eq!(parsed.vertex_count(), 5);
        assert_eq!(parsed.edge_count(), 0);

        Ok(())
    }

    macro_rules! expect_error {
        ( $input:expr, $( $cases:tt )* ) => {
            match DimacsGraphParser::parse($input as &[_]) {
                Ok(parsed) => panic!("Expected error but got {:?}", parsed),
                Err(err) => match err.downcast_ref() {
                    Some(casted_err) => match casted_err {
                        $( $cases )*,
                        _ => panic!("Unexpected error {:?}", casted_err),
                    },
                    None => panic!("Unexpected error type {:?}", err),
                }
            }
        };
    }

    #[test]
    fn invalid_headers() {
        expect_error!(b"pedge 1 3", ParseError::UnexpectedInput { .. } => ());
        expect_error!(b"p cnf 1 3", ParseError::InvalidHeader { .. } => ());
        expect_error!(b"p edge 1", ParseError::InvalidHeader { .. } => ());
        expect_error!(b"p edge 1 2 3", ParseError::InvalidHeader { .. } => ());
        expect_error!(b"p edge foo bar", ParseError::InvalidHeader { .. } => ());
        expect_error!(b"p edge -3 -6", ParseError::InvalidHeader { .. } => ());
        expect_error!(b"p edge 4 18446744073709551616", ParseError::InvalidHeader { .. } => ());
        expect_error!(
            b"p edge 1000000 0",
            ParseError::TooManyVertices { vertex_count: 1_000_000, .. } => ()
        );
        expect_error!(
            b"p edge 2 0\np edge 2 0\n",
            ParseError::DuplicateHeader { line: 2 } => ()
        );
        expect_error!(b"c nothing here\n", ParseError::MissingHeader { .. } => ());
        expect_error!(b"e 1 2\np edge 2 1\n", ParseError::MissingHeader { line: 1 } => ());
    }

    #[test]
    fn invalid_header_data() {
        expect_error!(
            b"p edge 3 1\ne 1 4\n",
            ParseError::VertexOutOfRange { line: 2, vertex: 4, vertex_count: 3 } => ()
        );

        expect_error!(
            b"p edge 3 1\ne 0 2\n",
            ParseError::VertexOutOfRange { vertex: 0, .. } => ()
        );

        expect_error!(
            b"p edge 3 1\ne 1 2\ne 2 3\n",
            ParseError::EdgeCount { edge_count: 2, header_edge_count: 1 } => ()
        );

        expect_error!(
            b"p edge 3 4\ne 1 2\n",
            ParseError::EdgeCount { edge_count: 1, header_edge_count: 4 } => ()
        );
    }

    #[test]
    fn syntax_errors() {
        expect_error!(
            b"p edge 3 1\ne 1 2 3\n",
            ParseError::InvalidEdge { line: 2, .. } => ()
        );

        expect_error!(
            b"p edge 3 1\ne 1\n",
            ParseError::InvalidEdge { .. } => ()
        );

        expect_error!(
            b"p edge 3 1\ne 1 x\n",
            ParseError::InvalidEdge { .. } => ()
        );

        expect_error!(
            b"p edge 3 1\n1 2\n",
            ParseError::UnexpectedInput { .. } => ()
        );

        expect_error!(
            b"p edge 3 1\ne 2 2\n",
            ParseError::SelfLoop { line: 2, vertex: 2 } => ()
        );
    }

    #[test]
    fn no_parsing_after_error() {
        let mut parser = DimacsGraphParser::new();
        assert!(parser.parse_chunk(b"e 1 2\n").is_err());
        match parser.parse_chunk(b"p edge 2 1\n") {
            Err(ParseError::PreviousError) => (),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn chunks_split_inside_lines() -> Result<(), Error> {
        let input = b"p edge 3 2\ne 1 2\ne 3 1\n";
        for split in 0..input.len() {
            let mut parser = DimacsGraphParser::new();
            parser.parse_chunk(&input[..split])?;
            parser.parse_chunk(&input[split..])?;
            parser.eof()?;
            parser.check_header()?;
            assert_eq!(parser.into_graph()?, graph![3; 1, 2; 3, 1]);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn written_graphs_parse_back(input in graph(0..30usize, 0.0..0.6)) {
            let mut buf = vec![];

            write_dimacs_graph(&mut buf, &input)?;

            let parsed = DimacsGraphParser::parse(&buf[..])
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(parsed, input);
        }
    }
}
