//! The DTD symbol table: element types, their declarations, rank stems and
//! short reference map names.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, anyhow, bail};
use itertools::Itertools;
use log::debug;

use crate::diagnostic::Diagnostic;
use crate::element_type::{
    ContentKind, DeclaredContent, ElementDefinition, ElementType, ElementTypeId, OmitFlags,
    RankStemId, ShortRefMapId,
};
use crate::location::Location;
use crate::model::{
    CompiledModel, ContentModelAmbiguity, ContentToken, LeafId, LeafKind, ModelGroup, compile,
};
use crate::options::{AmbiguityPolicy, Options};

/// A rank stem and the definitions of the ranked elements declared from it.
#[derive(Debug, Clone)]
pub struct RankStem {
    name: String,
    id: RankStemId,
    definitions: Vec<Rc<ElementDefinition>>,
}

impl RankStem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> RankStemId {
        self.id
    }

    pub fn definitions(&self) -> &[Rc<ElementDefinition>] {
        &self.definitions
    }
}

/// The parts of an element declaration other than its declared content.
#[derive(Debug, Clone, Default)]
pub struct ElementDecl {
    /// Element names, or rank stems when `rank_suffix` is set.
    pub names: Vec<String>,
    pub location: Location,
    pub omit: OmitFlags,
    pub inclusions: Vec<ElementTypeId>,
    pub exclusions: Vec<ElementTypeId>,
    pub rank_suffix: Option<String>,
}

impl ElementDecl {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            omit: OmitFlags::NONE,
            ..Self::default()
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn omit(mut self, omit: OmitFlags) -> Self {
        self.omit = omit;
        self
    }

    pub fn inclusions(mut self, inclusions: Vec<ElementTypeId>) -> Self {
        self.inclusions = inclusions;
        self
    }

    pub fn exclusions(mut self, exclusions: Vec<ElementTypeId>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn ranked(mut self, suffix: impl Into<String>) -> Self {
        self.rank_suffix = Some(suffix.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Dtd {
    name: String,
    element_types: Vec<ElementType>,
    element_type_names: HashMap<String, ElementTypeId>,
    n_element_definitions: usize,
    rank_stems: Vec<RankStem>,
    rank_stem_names: HashMap<String, RankStemId>,
    short_ref_maps: Vec<String>,
    short_ref_map_names: HashMap<String, ShortRefMapId>,
    document_element_type: ElementTypeId,
}

impl Dtd {
    /// An empty DTD. The document element type, named after the DTD, is
    /// always element type 0.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut dtd = Self {
            name: name.clone(),
            element_types: Vec::new(),
            element_type_names: HashMap::new(),
            n_element_definitions: 0,
            rank_stems: Vec::new(),
            rank_stem_names: HashMap::new(),
            short_ref_maps: Vec::new(),
            short_ref_map_names: HashMap::new(),
            document_element_type: ElementTypeId::new(0),
        };
        dtd.document_element_type = dtd.insert_element_type(name);
        dtd
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document_element_type(&self) -> ElementTypeId {
        self.document_element_type
    }

    // ─── Element types ──────────────────────────────────────────────────────

    /// Number of element type indices handed out so far.
    pub fn n_element_type_index(&self) -> usize {
        self.element_types.len()
    }

    /// The next dense element type index. Every element type is created
    /// through this counter.
    pub fn alloc_element_type_index(&self) -> ElementTypeId {
        ElementTypeId::new(self.element_types.len())
    }

    pub fn lookup_element_type(&self, name: &str) -> Option<ElementTypeId> {
        self.element_type_names.get(name).copied()
    }

    /// Look up an element type by name, creating it (without a definition)
    /// if it does not exist yet.
    pub fn insert_element_type(&mut self, name: impl Into<String>) -> ElementTypeId {
        let name = name.into();
        if let Some(id) = self.lookup_element_type(&name) {
            return id;
        }
        let id = self.alloc_element_type_index();
        self.element_types.push(ElementType::new(name.clone(), id));
        self.element_type_names.insert(name, id);
        id
    }

    pub fn element_type(&self, id: ElementTypeId) -> &ElementType {
        &self.element_types[id.index()]
    }

    pub fn element_type_mut(&mut self, id: ElementTypeId) -> &mut ElementType {
        &mut self.element_types[id.index()]
    }

    pub fn element_types(&self) -> impl Iterator<Item = &ElementType> {
        self.element_types.iter()
    }

    pub fn n_element_definitions(&self) -> usize {
        self.n_element_definitions
    }

    fn alloc_element_definition_index(&mut self) -> usize {
        let index = self.n_element_definitions;
        self.n_element_definitions += 1;
        index
    }

    // ─── Rank stems and short reference maps ────────────────────────────────

    pub fn lookup_rank_stem(&self, name: &str) -> Option<RankStemId> {
        self.rank_stem_names.get(name).copied()
    }

    pub fn insert_rank_stem(&mut self, name: impl Into<String>) -> RankStemId {
        let name = name.into();
        if let Some(id) = self.lookup_rank_stem(&name) {
            return id;
        }
        let id = RankStemId(self.rank_stems.len());
        self.rank_stems.push(RankStem {
            name: name.clone(),
            id,
            definitions: Vec::new(),
        });
        self.rank_stem_names.insert(name, id);
        id
    }

    pub fn rank_stem(&self, id: RankStemId) -> &RankStem {
        &self.rank_stems[id.0]
    }

    pub fn lookup_short_ref_map(&self, name: &str) -> Option<ShortRefMapId> {
        self.short_ref_map_names.get(name).copied()
    }

    pub fn insert_short_ref_map(&mut self, name: impl Into<String>) -> ShortRefMapId {
        let name = name.into();
        if let Some(id) = self.lookup_short_ref_map(&name) {
            return id;
        }
        let id = ShortRefMapId(self.short_ref_maps.len());
        self.short_ref_maps.push(name.clone());
        self.short_ref_map_names.insert(name, id);
        id
    }

    pub fn short_ref_map_name(&self, id: ShortRefMapId) -> &str {
        &self.short_ref_maps[id.0]
    }

    // ─── Element declarations ───────────────────────────────────────────────

    /// Declare elements whose content is a model group.
    ///
    /// Returns the diagnostics found while compiling the model. Fails if the
    /// declaration refers to element types this DTD never allocated, or if
    /// the model is ambiguous and the policy is [`AmbiguityPolicy::Reject`].
    pub fn declare_element(
        &mut self,
        decl: ElementDecl,
        model: ModelGroup,
        options: &Options,
    ) -> Result<Vec<Diagnostic>> {
        self.check_exceptions(&decl)?;
        self.check_model(&model)?;

        let mut diagnostics = Vec::new();
        // The outermost model group is not itself a content token.
        let cnt = model.grpgtcnt();
        if cnt - 1 > options.grpgtcnt {
            diagnostics.push(Diagnostic::GrpgtcntExceeded {
                limit: options.grpgtcnt,
            });
        }

        let result = compile(&model, self.n_element_type_index());
        if result.pcdata_unreachable && options.warn_mixed_content {
            diagnostics.push(Diagnostic::PcdataUnreachable);
        }
        if options.validate && options.ambiguity != AmbiguityPolicy::Ignore {
            let ambiguities = result
                .ambiguities
                .iter()
                .map(|a| self.ambiguity_diagnostic(&result.model, a))
                .collect_vec();
            if options.ambiguity == AmbiguityPolicy::Reject && !ambiguities.is_empty() {
                bail!(
                    "content model for {} rejected: {}",
                    decl.names.join(" "),
                    ambiguities.iter().join("; ")
                );
            }
            diagnostics.extend(ambiguities);
        }

        let index = self.alloc_element_definition_index();
        let content = DeclaredContent::ModelGroup(Rc::new(result.model));
        let definition = ElementDefinition::new(decl.location, Some(index), decl.omit, content);
        self.define(decl, definition, options, &mut diagnostics);
        Ok(diagnostics)
    }

    /// Declare elements whose content is `CDATA`, `RCDATA`, `EMPTY` or `ANY`.
    pub fn declare_element_keyword(
        &mut self,
        decl: ElementDecl,
        keyword: &str,
        options: &Options,
    ) -> Result<Vec<Diagnostic>> {
        let kind = ContentKind::from_keyword(keyword)
            .ok_or_else(|| anyhow!("unknown declared content keyword: {keyword}"))?;
        let content = DeclaredContent::from_kind(kind)
            .ok_or_else(|| anyhow!("{keyword} needs a model group"))?;
        if kind != ContentKind::Any && (!decl.inclusions.is_empty() || !decl.exclusions.is_empty())
        {
            bail!("exceptions are not allowed with declared content {keyword}");
        }
        self.check_exceptions(&decl)?;

        let mut diagnostics = Vec::new();
        let index = self.alloc_element_definition_index();
        let definition = ElementDefinition::new(decl.location, Some(index), decl.omit, content);
        self.define(decl, definition, options, &mut diagnostics);
        Ok(diagnostics)
    }

    /// Attach a definition to every element named by the declaration.
    fn define(
        &mut self,
        decl: ElementDecl,
        definition: ElementDefinition,
        options: &Options,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let mut definition = definition
            .with_inclusions(decl.inclusions)
            .with_exclusions(decl.exclusions);

        let (names, stems) = match &decl.rank_suffix {
            Some(suffix) => {
                let stems = decl
                    .names
                    .iter()
                    .map(|stem| self.insert_rank_stem(stem.as_str()))
                    .collect_vec();
                definition = definition.with_rank(suffix.as_str(), stems.clone());
                let names: Vec<String> =
                    decl.names.iter().map(|stem| format!("{stem}{suffix}")).collect();
                (names, stems)
            }
            None => (decl.names, Vec::new()),
        };

        let definition = Rc::new(definition);
        for (i, name) in names.into_iter().enumerate() {
            let id = self.insert_element_type(name);
            let element = self.element_type_mut(id);
            if element.definition().is_some() {
                if options.validate {
                    diagnostics.push(Diagnostic::DuplicateElementDefinition {
                        name: element.name().to_string(),
                    });
                }
                continue;
            }
            element.set_definition(definition.clone());
            if let Some(&stem) = stems.get(i) {
                self.element_type_mut(id).set_rank_stem(Some(stem));
                self.rank_stems[stem.0].definitions.push(definition.clone());
            }
            debug!(
                "declared element {} ({:?})",
                self.element_type(id).name(),
                definition.declared_content()
            );
        }
    }

    fn check_exceptions(&self, decl: &ElementDecl) -> Result<()> {
        for &e in decl.inclusions.iter().chain(&decl.exclusions) {
            self.check_element_type(e)?;
        }
        Ok(())
    }

    fn check_model(&self, group: &ModelGroup) -> Result<()> {
        group.members.iter().try_for_each(|member| match member {
            ContentToken::Leaf(leaf) => match leaf.kind.element_type() {
                Some(e) => self.check_element_type(e),
                None => Ok(()),
            },
            ContentToken::Group(group) => self.check_model(group),
        })
    }

    fn check_element_type(&self, e: ElementTypeId) -> Result<()> {
        if e.index() >= self.n_element_type_index() {
            bail!(
                "element type {e} was not allocated by DTD {} ({} types)",
                self.name,
                self.n_element_type_index()
            );
        }
        Ok(())
    }

    /// Name of the token a leaf matches, as written in a declaration.
    pub fn leaf_name(&self, model: &CompiledModel, leaf: LeafId) -> String {
        match model.leaf(leaf).kind() {
            LeafKind::Element(e) => self.element_type(e).name().to_string(),
            LeafKind::Pcdata | LeafKind::Initial => "#PCDATA".to_string(),
        }
    }

    fn ambiguity_diagnostic(
        &self,
        model: &CompiledModel,
        ambiguity: &ContentModelAmbiguity,
    ) -> Diagnostic {
        let from_leaf = model.leaf(ambiguity.from);
        let from = (!from_leaf.is_initial())
            .then(|| (self.leaf_name(model, ambiguity.from), from_leaf.type_index() + 1));
        Diagnostic::AmbiguousModel {
            from,
            and_matches: model
                .leaf_and_depth(ambiguity.from)
                .saturating_sub(ambiguity.and_depth),
            token: self.leaf_name(model, ambiguity.to1),
            first: model.leaf(ambiguity.to1).type_index() + 1,
            second: model.leaf(ambiguity.to2).type_index() + 1,
        }
    }
}
